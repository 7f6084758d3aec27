//! CLI startup smoke tests.
//!
//! Verifies that the offline subcommands exit cleanly (or with expected
//! codes) without panicking. Uses `std::process::Command` against the
//! compiled binary.

use std::process::{Command, Output};

fn trakbot_bin() -> std::path::PathBuf {
    env!("CARGO_BIN_EXE_trakbot").into()
}

fn describe(output: &Output) -> String {
    format!(
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    )
}

#[test]
fn help_exits_zero() {
    let output = Command::new(trakbot_bin())
        .arg("--help")
        .output()
        .expect("failed to run trakbot --help");

    assert!(output.status.success(), "trakbot --help failed:\n{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trakbot"), "help should mention 'trakbot': {stdout}");
    assert!(stdout.contains("run"), "help should list `run`: {stdout}");
}

#[test]
fn version_exits_zero() {
    let output = Command::new(trakbot_bin())
        .arg("--version")
        .output()
        .expect("failed to run trakbot --version");

    assert!(output.status.success(), "trakbot --version failed:\n{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trakbot"), "version should mention 'trakbot': {stdout}");
}

#[test]
fn init_writes_a_loadable_config_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("trakbot.toml");

    let output = Command::new(trakbot_bin())
        .arg("--config")
        .arg(&path)
        .arg("init")
        .output()
        .expect("failed to run trakbot init");
    assert!(output.status.success(), "trakbot init failed:\n{}", describe(&output));

    let written = std::fs::read_to_string(&path).unwrap();
    let config = trakbot::config::BotConfig::parse(&written).unwrap();
    assert_eq!(config.nick, "trakbot");

    // A second init refuses to clobber it.
    let output = Command::new(trakbot_bin())
        .arg("--config")
        .arg(&path)
        .arg("init")
        .output()
        .expect("failed to run trakbot init");
    assert!(!output.status.success(), "second init should fail:\n{}", describe(&output));
}

#[test]
fn sessions_lists_saved_nicks() {
    let dir = tempfile::TempDir::new().unwrap();
    let storage = dir.path().join("sessions");
    let config = dir.path().join("trakbot.toml");
    std::fs::write(
        &config,
        format!("storage_dir = {:?}\n", storage.to_string_lossy()),
    )
    .unwrap();

    let mut store = trakbot::session::store::SessionStore::new(&storage);
    store.for_nick("dug");
    store.save("dug").unwrap();

    let output = Command::new(trakbot_bin())
        .arg("-c")
        .arg(&config)
        .arg("sessions")
        .output()
        .expect("failed to run trakbot sessions");
    assert!(output.status.success(), "trakbot sessions failed:\n{}", describe(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "dug");
}

#[test]
fn run_with_missing_explicit_config_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = Command::new(trakbot_bin())
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("run")
        .output()
        .expect("failed to run trakbot run");

    assert!(!output.status.success(), "run should fail:\n{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No config found"), "stderr: {stderr}");
}

#[test]
fn missing_default_config_falls_back_to_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = Command::new(trakbot_bin())
        .current_dir(dir.path())
        .arg("sessions")
        .output()
        .expect("failed to run trakbot sessions");

    assert!(output.status.success(), "sessions without a config failed:\n{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No saved sessions in .trakbot/sessions"), "{stdout}");
}

#[test]
fn unknown_config_key_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("trakbot.toml");
    std::fs::write(&config, "bogus = 1\n").unwrap();

    let output = Command::new(trakbot_bin())
        .arg("-c")
        .arg(&config)
        .arg("sessions")
        .output()
        .expect("failed to run trakbot sessions");
    assert!(!output.status.success(), "bad config should fail:\n{}", describe(&output));
}
