//! CLI domain: parse, input, host, route, output, and presentation only.
//! The batch engine does the work; the route table wires it to the console.

mod help;
mod host;
mod input;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use host::{ConsoleHost, PromptMode};
pub use input::{open_inputs, InputReader, OperationTemplate};
pub use output::map_error;
pub use parse::{BatchArgs, Cli, Commands};
pub use presentation::{format_config_toml, format_stats_table};
pub use route::RunContext;
