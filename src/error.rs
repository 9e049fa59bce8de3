//! Error types for the framewire frame runtime.

use thiserror::Error;

/// Markup parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unterminated tag starting at byte {offset}")]
    UnterminatedTag { offset: usize },

    #[error("Unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },
}

/// Errors surfaced by frame updates, fetching and configuration
#[derive(Debug, Error)]
pub enum FrameError {
    /// The selector resolved to nothing in the live document.
    #[error("Frame not found: {0}")]
    NotFound(String),

    /// The transport could not reach the server.
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The server answered with something the runtime cannot use.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The update was superseded or explicitly cancelled.
    #[error("Frame update cancelled")]
    Cancelled,

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FrameError {
    /// Whether this error is the expected outcome of being superseded.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FrameError::Cancelled)
    }
}

impl From<config::ConfigError> for FrameError {
    fn from(err: config::ConfigError) -> Self {
        FrameError::Config(err.to_string())
    }
}
