//! CLI domain: parse, route, help, output, and presentation only.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_merge_output, format_refresh_output, OutputFormat};
pub use route::RunContext;
