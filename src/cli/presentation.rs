//! CLI presentation: text and json formatters per command.

use crate::config::FramewireConfig;
use crate::coordinator::UpdateOutcome;
use crate::error::FrameError;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Json,
}

impl FromStr for OutputFormat {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" | "text" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(FrameError::Config(format!(
                "Invalid output format: {} (must be 'html' or 'json')",
                other
            ))),
        }
    }
}

fn outcome_label(outcome: &UpdateOutcome) -> &'static str {
    match outcome {
        UpdateOutcome::Reconciled(_) => "reconciled",
        UpdateOutcome::Unchanged => "unchanged",
    }
}

pub fn format_refresh_output(
    html: &str,
    outcome: &UpdateOutcome,
    mutations: u64,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Html => html.to_string(),
        OutputFormat::Json => json!({
            "outcome": outcome_label(outcome),
            "mutations": mutations,
            "fetched_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "html": html,
        })
        .to_string(),
    }
}

/// Render the merged configuration as `toml` or `json`.
pub fn format_config_output(config: &FramewireConfig, format: &str) -> Result<String, FrameError> {
    match format {
        "toml" => toml::to_string_pretty(config)
            .map_err(|e| FrameError::Config(format!("Failed to render config: {}", e))),
        "json" => serde_json::to_string_pretty(config)
            .map_err(|e| FrameError::Config(format!("Failed to render config: {}", e))),
        other => Err(FrameError::Config(format!(
            "Invalid config format: {} (must be 'toml' or 'json')",
            other
        ))),
    }
}

pub fn format_merge_output(
    html: &str,
    outcome: &UpdateOutcome,
    mutations: u64,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Html => format!("{}\nmutations: {}", html, mutations),
        OutputFormat::Json => json!({
            "outcome": outcome_label(outcome),
            "mutations": mutations,
            "html": html,
        })
        .to_string(),
    }
}
