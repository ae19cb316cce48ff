use blib_test_helpers::prelude::*;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_help_command() {
    blib_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("B-Lib bookmark library"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_version_command() {
    blib_command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_init_command() {
    let temp = temp_dir();

    blib_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Created .blib/config.toml"));

    let content = fs::read_to_string(temp.path().join(".blib/config.toml")).unwrap();
    assert!(content.contains("[remote]"));
    assert!(content.contains("bookmarks-realtime"));
}

#[test]
fn test_init_keeps_existing_config() {
    let temp = workspace_with_config("[remote]\nproject_url = \"https://abc.supabase.co\"\n");

    blib_command()
        .arg("--root")
        .arg(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    let content = fs::read_to_string(temp.path().join(".blib/config.toml")).unwrap();
    assert!(content.contains("abc.supabase.co"));
}

#[test]
fn test_ls_requires_sign_in() {
    let temp = init_workspace();

    blib_command()
        .current_dir(temp.path())
        .arg("ls")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_missing_remote_settings_is_config_error() {
    let temp = init_workspace();

    blib_command()
        .current_dir(temp.path())
        .env("BLIB_USER_ID", "user-1")
        .env("BLIB_ACCESS_TOKEN", "eyJhbGciOiJIUzI1NiJ9.secret")
        .args(["add", "example.com"])
        .assert()
        .failure()
        .code(101)
        .stderr(predicate::str::contains("project_url cannot be empty"))
        .stderr(no_credentials());
}

#[test]
fn test_add_rejects_blank_url() {
    let temp = init_workspace();

    blib_command()
        .current_dir(temp.path())
        .args(["add", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("URL cannot be empty"));
}

#[test]
fn test_rm_requires_id() {
    blib_command().arg("rm").assert().failure().code(2);
}
