#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn launchbench() -> Command {
    let mut cmd = Command::cargo_bin("launchbench").unwrap();
    cmd.env_remove("LAUNCHBENCH_EXE")
        .env_remove("LAUNCHBENCH_PROFILE_DIR")
        .env_remove("LAUNCHBENCH_ITERATIONS")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_options() {
    launchbench()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("<EXE>"))
        .stdout(predicate::str::contains("<PROFILE_DIR>"))
        .stdout(predicate::str::contains("--cold-start"))
        .stdout(predicate::str::contains("--settle-secs"));
}

#[test]
fn test_version() {
    launchbench()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_arguments() {
    launchbench()
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_nonexistent_executable() {
    let temp = TempDir::new().unwrap();
    launchbench()
        .arg(temp.path().join("chrome"))
        .arg(temp.path().join("profile"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Executable does not exist"));
}

#[test]
fn test_preload_size_requires_preload() {
    let temp = TempDir::new().unwrap();
    launchbench()
        .arg(temp.path().join("chrome"))
        .arg(temp.path().join("profile"))
        .args(["--preload-size", "4096"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--preload"));
}

#[test]
fn test_executable_from_environment() {
    let temp = TempDir::new().unwrap();
    launchbench()
        .env("LAUNCHBENCH_EXE", temp.path().join("firefox"))
        .env("LAUNCHBENCH_PROFILE_DIR", temp.path().join("profile"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Executable does not exist"));
}
