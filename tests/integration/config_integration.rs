//! Integration tests for Configuration System

use super::test_utils::with_env;
use framewire::config::{global_config_path, ConfigLoader};
use tempfile::TempDir;

fn write(path: &std::path::Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_workspace_files_layer_over_defaults() {
    let workspace = TempDir::new().unwrap();
    let xdg = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/config.toml"),
        r#"
[fetch]
base_url = "http://localhost:3000"
request_timeout_ms = 2000

[markup]
key_attribute = "data-id"
"#,
    );
    write(
        &workspace.path().join("config/staging.toml"),
        r#"
[fetch]
base_url = "https://staging.example.com"
"#,
    );

    let config = with_env(
        &[
            ("XDG_CONFIG_HOME", Some(xdg.path().to_str().unwrap())),
            ("FRAMEWIRE_ENV", Some("staging")),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(
        config.fetch.base_url.as_deref(),
        Some("https://staging.example.com")
    );
    assert_eq!(config.fetch.request_timeout_ms, 2000);
    assert_eq!(config.fetch.connect_timeout_ms, 10_000);
    assert_eq!(config.markup.key_attribute, "data-id");
    assert_eq!(config.markup.frame_target_attribute, "data-frame");
    assert!(config.validate().is_ok());
}

#[test]
fn test_global_file_is_overridden_by_workspace() {
    let workspace = TempDir::new().unwrap();
    let xdg = TempDir::new().unwrap();
    write(
        &xdg.path().join("framewire/config.toml"),
        r#"
[fetch]
frame_header = "X-Region"
user_agent = "framewire-test"

[logging]
level = "warn"
"#,
    );
    write(
        &workspace.path().join("config/config.toml"),
        r#"
[logging]
level = "debug"
"#,
    );

    let (path, config) = with_env(
        &[
            ("XDG_CONFIG_HOME", Some(xdg.path().to_str().unwrap())),
            ("FRAMEWIRE_ENV", None),
        ],
        || (global_config_path(), ConfigLoader::load(workspace.path()).unwrap()),
    );

    assert_eq!(path, Some(xdg.path().join("framewire/config.toml")));
    assert_eq!(config.fetch.frame_header, "X-Region");
    assert_eq!(config.fetch.user_agent.as_deref(), Some("framewire-test"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_environment_overrides_files() {
    let workspace = TempDir::new().unwrap();
    let xdg = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/config.toml"),
        r#"
[markup]
touched_prefix = "data-dirty"
"#,
    );

    let config = with_env(
        &[
            ("XDG_CONFIG_HOME", Some(xdg.path().to_str().unwrap())),
            ("FRAMEWIRE__MARKUP__TOUCHED_PREFIX", Some("data-edited")),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.markup.touched_prefix, "data-edited");
}

#[test]
fn test_invalid_values_are_reported() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("framewire.toml");
    write(
        &file,
        r#"
[fetch]
base_url = "::not a url::"
request_timeout_ms = 0

[logging]
format = "yaml"
"#,
    );

    let config = ConfigLoader::load_from_file(&file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
    let message = config.ensure_valid().unwrap_err().to_string();
    assert!(message.contains("Fetch"));
    assert!(message.contains("Logging"));
}
