//! Integration tests for the bulkop batch engine and its configuration

mod batch_executor;
mod cli_binary;
