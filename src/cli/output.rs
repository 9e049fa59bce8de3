//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::FrameError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &FrameError) -> String {
    match e {
        FrameError::NotFound(selector) => format!("No frame matches {}", selector),
        FrameError::Network { url, message } => {
            format!("Could not reach {}: {}", url, message)
        }
        other => other.to_string(),
    }
}
