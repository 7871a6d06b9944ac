//! Command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string used in log events (e.g. "delete", "invoke").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Create { .. } => "create",
        Commands::Update { .. } => "update",
        Commands::Upsert { .. } => "upsert",
        Commands::Delete { .. } => "delete",
        Commands::Invoke { .. } => "invoke",
        Commands::Config => "config",
    }
}
