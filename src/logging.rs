//! Structured logging for the runtime and the CLI.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job. Settings come from [`LoggingConfig`] with `FRAMEWIRE_LOG*`
//! environment variables taking precedence.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "FRAMEWIRE_LOG";
const ENV_FORMAT: &str = "FRAMEWIRE_LOG_FORMAT";
const ENV_OUTPUT: &str = "FRAMEWIRE_LOG_OUTPUT";
const ENV_MODULES: &str = "FRAMEWIRE_LOG_MODULES";

/// `[logging]` section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When false no subscriber is installed.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Base filter level (`trace` .. `error`, or `off`).
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// `text` or `json`.
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,

    /// `stdout`, `stderr` or `file`.
    #[serde(default = "LoggingConfig::default_output")]
    pub output: String,

    #[serde(default = "LoggingConfig::default_file")]
    pub file: PathBuf,

    /// ANSI colors; ignored for json and file output.
    #[serde(default = "enabled_by_default")]
    pub color: bool,

    /// Per-target levels, e.g. `framewire::reconcile = "trace"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn enabled_by_default() -> bool {
    true
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }

    fn default_format() -> String {
        "text".into()
    }

    // stdout carries rendered HTML from the CLI
    fn default_output() -> String {
        "stderr".into()
    }

    fn default_file() -> PathBuf {
        PathBuf::from(".framewire").join("framewire.log")
    }

    /// Check every string-typed setting without touching the environment.
    pub fn validate(&self) -> Result<(), String> {
        self.format.parse::<LogFormat>()?;
        self.output.parse::<LogOutput>()?;
        EnvFilter::try_new(&self.level)
            .map_err(|e| format!("Invalid level '{}': {}", self.level, e))?;
        for (target, level) in &self.modules {
            module_directive(target, level)?;
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: enabled_by_default(),
            level: Self::default_level(),
            format: Self::default_format(),
            output: Self::default_output(),
            file: Self::default_file(),
            color: enabled_by_default(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid format '{}' (expected text or json)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(format!(
                "Invalid output '{}' (expected stdout, stderr or file)",
                other
            )),
        }
    }
}

fn module_directive(target: &str, level: &str) -> Result<Directive, String> {
    format!("{}={}", target.trim(), level.trim())
        .parse()
        .map_err(|e| format!("Invalid module level '{}={}': {}", target, level, e))
}

/// Settings after environment overrides have been applied.
struct Resolved {
    filter: EnvFilter,
    format: LogFormat,
    output: LogOutput,
    color: bool,
    file: PathBuf,
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn resolve(config: &LoggingConfig) -> Result<Resolved, FrameError> {
    let invalid = |msg: String| FrameError::Config(format!("Logging: {}", msg));

    let filter = match EnvFilter::try_from_env(ENV_FILTER) {
        Ok(filter) => filter,
        Err(_) => {
            let mut filter = EnvFilter::try_new(&config.level)
                .map_err(|e| invalid(format!("Invalid level '{}': {}", config.level, e)))?;
            for (target, level) in &config.modules {
                filter = filter.add_directive(module_directive(target, level).map_err(invalid)?);
            }
            if let Some(modules) = env_value(ENV_MODULES) {
                for entry in modules.split(',') {
                    if let Some((target, level)) = entry.split_once('=') {
                        let directive = module_directive(target, level).map_err(invalid)?;
                        filter = filter.add_directive(directive);
                    }
                }
            }
            filter
        }
    };

    let format = env_value(ENV_FORMAT)
        .unwrap_or_else(|| config.format.clone())
        .parse::<LogFormat>()
        .map_err(invalid)?;
    let output = env_value(ENV_OUTPUT)
        .unwrap_or_else(|| config.output.clone())
        .parse::<LogOutput>()
        .map_err(invalid)?;

    Ok(Resolved {
        filter,
        format,
        output,
        color: config.color && format == LogFormat::Text && output != LogOutput::File,
        file: config.file.clone(),
    })
}

fn make_writer(settings: &Resolved) -> Result<BoxMakeWriter, FrameError> {
    match settings.output {
        LogOutput::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
        LogOutput::Stderr => Ok(BoxMakeWriter::new(std::io::stderr)),
        LogOutput::File => {
            if let Some(dir) = settings.file.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir).map_err(|e| {
                    FrameError::Config(format!("Cannot create {}: {}", dir.display(), e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&settings.file)
                .map_err(|e| {
                    FrameError::Config(format!("Cannot open {}: {}", settings.file.display(), e))
                })?;
            Ok(BoxMakeWriter::new(std::sync::Mutex::new(file)))
        }
    }
}

/// Install the global subscriber. `None` uses defaults.
///
/// Fails when the settings are invalid, the log file cannot be opened, or a
/// subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), FrameError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    if !config.enabled {
        return Ok(());
    }

    let settings = resolve(config)?;
    let writer = make_writer(&settings)?;
    let registry = Registry::default().with(settings.filter);
    let installed = match settings.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(settings.color)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|e| FrameError::Config(format!("Failed to install logger: {}", e)))
}
