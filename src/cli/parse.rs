//! CLI parse: clap types for bulkop. No behavior; definitions only.

use crate::rpc::BypassMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bulkop CLI - batched record operations with per-item retry
#[derive(Parser)]
#[command(name = "bulkop")]
#[command(about = "Batched create/update/delete/invoke operations against a record service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ is looked up)
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Record service base URL (overrides connection.endpoint)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Print per-operation diagnostics and debug logging
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create one record per input item ({"table", "attributes"})
    Create {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Update records by id ({"table", "id", "attributes"})
    Update {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Create or update records by id ({"table", "id", "attributes"})
    Upsert {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Delete records ({"table", "id"}, plus "entity1"/"entity2" with --relationship)
    Delete {
        /// Treat records that do not exist as already deleted
        #[arg(long)]
        if_exists: bool,

        /// Many-to-many relationship; deletes become disassociations
        #[arg(long)]
        relationship: Option<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Execute a named request once per input item (item = parameter object)
    Invoke {
        /// Request name, e.g. WhoAmI
        #[arg(long = "request")]
        request_name: String,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Print the effective configuration as TOML
    Config,
}

impl Commands {
    /// Batch flags of an operation command.
    pub fn batch_args(&self) -> Option<&BatchArgs> {
        match self {
            Commands::Create { batch }
            | Commands::Update { batch }
            | Commands::Upsert { batch }
            | Commands::Delete { batch, .. }
            | Commands::Invoke { batch, .. } => Some(batch),
            Commands::Config => None,
        }
    }
}

/// Flags shared by every operation command. Unset values fall back to `[batch]` config.
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Input file: a JSON array or JSON Lines ("-" or absent reads stdin)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Operations per composite request (1 disables batching)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Retry attempts per operation for transient failures
    #[arg(long)]
    pub retries: Option<u32>,

    /// Base of the exponential backoff, in seconds
    #[arg(long)]
    pub initial_retry_delay: Option<u64>,

    /// Skip custom business logic on the service
    #[arg(long, value_enum, value_delimiter = ',')]
    pub bypass_business_logic_execution: Vec<BypassMode>,

    /// Registered step ids to skip (repeatable)
    #[arg(long = "bypass-step-id")]
    pub bypass_step_ids: Vec<String>,

    /// Ask before each operation
    #[arg(long)]
    pub confirm: bool,

    /// Show what would run without calling the service
    #[arg(long)]
    pub what_if: bool,
}
