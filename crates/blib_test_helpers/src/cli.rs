//! CLI command builders for tests
//!
//! Commands run with `RUST_LOG=error` and without inherited credentials so
//! a developer's own session never leaks into a test.

use assert_cmd::Command;

/// Get a Command for the `blib` binary with clean environment
///
/// # Example
///
/// ```rust,no_run
/// use blib_test_helpers::cli::blib_command;
///
/// blib_command().arg("--version").assert().success();
/// ```
#[allow(deprecated)]
pub fn blib_command() -> Command {
    let mut cmd = Command::cargo_bin("blib").expect("Failed to find blib binary");
    cmd.env("RUST_LOG", "error");
    cmd.env_remove("BLIB_USER_ID");
    cmd.env_remove("BLIB_ACCESS_TOKEN");
    cmd
}
