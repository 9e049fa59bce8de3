//! Loading entry points.

use super::{merge, sources, FramewireConfig};
use config::{ConfigError, Environment, File};
use std::path::Path;

/// Loads [`FramewireConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then global file, then workspace files, then `FRAMEWIRE__SECTION__KEY` env.
    pub fn load(workspace_root: &Path) -> Result<FramewireConfig, ConfigError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Defaults, then the given file, then env.
    pub fn load_from_file(path: &Path) -> Result<FramewireConfig, ConfigError> {
        merge::builder_with_defaults()?
            .add_source(File::from(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("FRAMEWIRE")
        .prefix_separator("__")
        .separator("__")
}
