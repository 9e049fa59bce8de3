//! CLI parse: clap types for framewire. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Framewire CLI - refresh and merge HTML frames
#[derive(Parser, Debug)]
#[command(name = "framewire")]
#[command(about = "Refresh independently updatable regions of an HTML page")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh one frame of a saved page from the server and print the page
    Refresh {
        /// HTML file holding the current page
        #[arg(long)]
        page: PathBuf,
        /// Frame selector: `body`, `#id` or a bare id
        #[arg(long, default_value = "body")]
        frame: String,
        /// URL to request (relative URLs need fetch.base_url)
        #[arg(long)]
        url: String,
        /// HTTP method (get or post)
        #[arg(long, default_value = "get")]
        method: String,
        /// Urlencoded request body
        #[arg(long)]
        data: Option<String>,
        /// Output format (html or json)
        #[arg(long, default_value = "html")]
        format: String,
    },
    /// Merge a frame of one page into the same frame of another, offline
    Merge {
        /// HTML file holding the live page
        #[arg(long)]
        current: PathBuf,
        /// HTML file holding the freshly rendered page
        #[arg(long)]
        new: PathBuf,
        /// Frame selector: `body`, `#id` or a bare id
        #[arg(long, default_value = "body")]
        frame: String,
        /// Output format (html or json)
        #[arg(long, default_value = "html")]
        format: String,
    },
    /// Print the effective configuration after all layers are merged
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}
