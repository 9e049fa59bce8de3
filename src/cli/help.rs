//! CLI command-name contract for logging.

use crate::cli::parse::Commands;

/// Stable command name (e.g. "refresh", "config").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Refresh { .. } => "refresh",
        Commands::Merge { .. } => "merge",
        Commands::Config { .. } => "config",
    }
}
