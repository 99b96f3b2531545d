//! End-to-end tests for the `fly-enter` binary.
//!
//! The pod is simulated by the test process itself: `/proc/<own pid>/root`
//! resolves to `/`, and the pod directory is a temp dir used as the
//! binary's working directory.
//!
//! Tests that need `chroot` are split by privilege: as root they check the
//! exec path, otherwise they check that the chroot failure is reported as a
//! setup failure.

#![cfg(target_os = "linux")]

use assert_cmd::Command;
use flyenter::{
    AppName, EXIT_EXEC_FAILED, EXIT_SETUP_FAILED, Environment, EnvironmentStore, UidRange,
    env_file_path,
};
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn fly_enter() -> Command {
    let mut cmd = Command::cargo_bin("fly-enter").unwrap();
    cmd.env_remove("FLY_ENTER_DEBUG");
    cmd
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}

fn own_pid() -> String {
    std::process::id().to_string()
}

/// Creates a pod dir with an environment file for `app`.
fn pod_with_env(app: &str, env: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    let app = AppName::new(app).unwrap();
    let env: Environment = env.iter().copied().collect();
    EnvironmentStore::new()
        .write(
            &app,
            &env,
            &UidRange::identity(),
            &env_file_path(temp.path(), &app),
        )
        .unwrap();
    temp
}

// =============================================================================
// Argument Tests
// =============================================================================

#[test]
fn test_help_succeeds() {
    fly_enter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--appname"));
}

#[test]
fn test_missing_flags_is_setup_failure() {
    fly_enter()
        .args(["--pid", "1"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED));
}

#[test]
fn test_missing_command_is_setup_failure() {
    fly_enter()
        .args(["--pid", "1", "--appname", "web"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED));
}

#[test]
fn test_invalid_app_name_is_setup_failure() {
    fly_enter()
        .args(["--pid", "1", "--appname", "../etc", "--", "/bin/true"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED))
        .stderr(predicate::str::contains("invalid app name"));
}

#[test]
fn test_path_like_pid_is_setup_failure() {
    let pod = pod_with_env("web", &[]);
    let planted = TempDir::new().unwrap();
    std::os::unix::fs::symlink("/", planted.path().join("root")).unwrap();

    fly_enter()
        .current_dir(pod.path())
        .args(["--pid", planted.path().to_str().unwrap(), "--appname", "web", "--", "/bin/true"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED))
        .stderr(predicate::str::contains("invalid pid"));
}

// =============================================================================
// Entry Failure Tests
// =============================================================================

#[test]
fn test_unknown_pid_is_setup_failure() {
    let pod = pod_with_env("web", &[]);

    fly_enter()
        .current_dir(pod.path())
        .args(["--pid", "999999999", "--appname", "web", "--", "/bin/true"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED))
        .stderr(predicate::str::contains("failed to get pod root"));
}

#[test]
fn test_missing_env_file_is_setup_failure() {
    let pod = TempDir::new().unwrap();

    fly_enter()
        .current_dir(pod.path())
        .args(["--pid", &own_pid(), "--appname", "web", "--", "/bin/true"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED))
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_chroot_denied_is_setup_failure() {
    if is_root() {
        return;
    }
    let pod = pod_with_env("web", &[]);

    fly_enter()
        .current_dir(pod.path())
        .args(["--pid", &own_pid(), "--appname", "web", "--", "/bin/true"])
        .assert()
        .code(i32::from(EXIT_SETUP_FAILED))
        .stderr(predicate::str::contains("failed to chroot"));
}

// =============================================================================
// Exec Tests (root only)
// =============================================================================

#[test]
fn test_missing_binary_is_exec_failure() {
    if !is_root() {
        return;
    }
    let pod = pod_with_env("web", &[]);

    fly_enter()
        .current_dir(pod.path())
        .args(["--pid", &own_pid(), "--appname", "web", "--", "/does/not/exist"])
        .assert()
        .code(i32::from(EXIT_EXEC_FAILED))
        .stderr(predicate::str::contains("exec failed"));
}

#[test]
fn test_exec_runs_with_restored_env() {
    if !is_root() {
        return;
    }
    let pod = pod_with_env("web", &[("GREETING", "hello from the pod")]);

    fly_enter()
        .current_dir(pod.path())
        .args([
            "--pid",
            &own_pid(),
            "--appname",
            "web",
            "--",
            "/bin/sh",
            "-c",
            "echo \"$GREETING:$USER\"",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from the pod:root"));
}

#[test]
fn test_debug_echoes_diagnostics() {
    if !is_root() {
        return;
    }
    let pod = pod_with_env("web", &[]);

    fly_enter()
        .current_dir(pod.path())
        .args([
            "--debug",
            "--pid",
            &own_pid(),
            "--appname",
            "web",
            "--",
            "/does/not/exist",
        ])
        .assert()
        .code(i32::from(EXIT_EXEC_FAILED))
        .stderr(predicate::str::contains("APP: web"))
        .stderr(predicate::str::contains("ARGS:"));
}
