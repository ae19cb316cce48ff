//! Workspace initialization utilities for tests
//!
//! Temporary directories holding a `.blib/config.toml` for CLI tests.

use assert_fs::TempDir;
use std::fs;

/// Create a temporary directory for testing
///
/// The directory will be automatically cleaned up when the `TempDir` is dropped.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Temp directory with the default config template written
///
/// # Example
///
/// ```rust
/// use blib_test_helpers::workspace::init_workspace;
///
/// let workspace = init_workspace();
/// assert!(workspace.path().join(".blib/config.toml").exists());
/// ```
pub fn init_workspace() -> TempDir {
    let temp = temp_dir();
    blib_config::Config::write_template(temp.path()).expect("Failed to write config template");
    temp
}

/// Temp directory with `content` as its config file
pub fn workspace_with_config(content: &str) -> TempDir {
    let temp = temp_dir();
    let config_path = temp.path().join(blib_config::CONFIG_PATH);
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).expect("Failed to create .blib directory");
    }
    fs::write(&config_path, content).expect("Failed to write config");
    temp
}
