//! Configuration System
//!
//! Layered configuration (defaults, global file, workspace files, environment) for the fetch
//! transport, the markup attribute contract, and logging.

use crate::error::FrameError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

pub use crate::fetch::FetchConfig;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FramewireConfig {
    /// Transport settings for frame requests
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Attribute contract shared with server-rendered markup
    #[serde(default)]
    pub markup: MarkupConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reserved attribute names consumed from server output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Attribute carrying a child's identity key
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,

    /// Prefix of the client-owned "touched" attribute family
    #[serde(default = "default_touched_prefix")]
    pub touched_prefix: String,

    /// `<meta name>` carrying the page CSP nonce
    #[serde(default = "default_nonce_meta")]
    pub nonce_meta: String,

    /// Attribute on links and forms naming the frame they refresh
    #[serde(default = "default_frame_target_attribute")]
    pub frame_target_attribute: String,
}

fn default_key_attribute() -> String {
    "data-key".to_string()
}

fn default_touched_prefix() -> String {
    "data-touched".to_string()
}

fn default_nonce_meta() -> String {
    crate::dom::DEFAULT_NONCE_META.to_string()
}

fn default_frame_target_attribute() -> String {
    "data-frame".to_string()
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            key_attribute: default_key_attribute(),
            touched_prefix: default_touched_prefix(),
            nonce_meta: default_nonce_meta(),
            frame_target_attribute: default_frame_target_attribute(),
        }
    }
}

impl MarkupConfig {
    pub fn validate(&self) -> Result<(), String> {
        let names = [
            ("key_attribute", &self.key_attribute),
            ("touched_prefix", &self.touched_prefix),
            ("nonce_meta", &self.nonce_meta),
            ("frame_target_attribute", &self.frame_target_attribute),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", field));
            }
            if value.chars().any(|c| c.is_whitespace() || c.is_ascii_uppercase()) {
                return Err(format!(
                    "{} must be a lowercase attribute name, got {:?}",
                    field, value
                ));
            }
        }
        if self.key_attribute == "style" || self.key_attribute.starts_with(&self.touched_prefix) {
            return Err("key_attribute must be a synced attribute".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Fetch(String),
    Markup(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Fetch(msg) => write!(f, "Fetch: {}", msg),
            ValidationError::Markup(msg) => write!(f, "Markup: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FramewireConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.fetch.validate() {
            errors.push(ValidationError::Fetch(e));
        }
        if let Err(e) = self.markup.validate() {
            errors.push(ValidationError::Markup(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all problems into one error.
    pub fn ensure_valid(&self) -> Result<(), FrameError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            FrameError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}
