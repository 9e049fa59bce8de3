//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("fetch.frame_header", "X-Frame-Id")?
        .set_default("fetch.connect_timeout_ms", 10_000i64)?
        .set_default("fetch.request_timeout_ms", 30_000i64)?
        .set_default("markup.key_attribute", "data-key")?
        .set_default("markup.touched_prefix", "data-touched")?
        .set_default("markup.nonce_meta", "csp-nonce")?
        .set_default("markup.frame_target_attribute", "data-frame")
}
