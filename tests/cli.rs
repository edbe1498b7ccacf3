//! CLI contract tests: argument surface and validator exit codes.

use assert_cmd::Command;

fn write_config(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("kickai.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

fn run(args: &[&str], config: &std::path::Path, db: &std::path::Path) -> std::process::Output {
    Command::cargo_bin("kickai")
        .expect("binary")
        .args(args)
        .env("KICKAI_CONFIG_PATH", config)
        .env("KICKAI_DB_PATH", db)
        .env_remove("KICKAI_INVITE_SECRET_KEY")
        .env_remove("KICKAI_AI_PROVIDER")
        .env_remove("KICKAI_BOT_TOKEN")
        .output()
        .expect("run binary")
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("kickai")
        .expect("binary")
        .arg("--help")
        .output()
        .expect("run binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("config"));
}

#[test]
fn validate_passes_with_complete_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(
        dir.path(),
        r#"
        invite_secret_key = "super-secret-key"
        [ai]
        provider = "mock"
        [database]
        project_id = "kickai-test"
        "#,
    );

    let output = run(&["validate"], &config, &dir.path().join("test.db"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("Overall status: passed"));
}

#[test]
fn validate_fails_without_invite_secret() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(
        dir.path(),
        r#"
        [ai]
        provider = "mock"
        [database]
        project_id = "kickai-test"
        "#,
    );

    let output = run(&["validate"], &config, &dir.path().join("test.db"));
    assert!(
        !output.status.success(),
        "process must exit non-zero on a critical failure"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("invite_secret_key"), "stdout: {stdout}");
    assert!(stdout.contains("Overall status: failed"));
}

#[test]
fn config_subcommand_redacts_secrets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(
        dir.path(),
        r#"
        invite_secret_key = "super-secret-key"
        [database]
        project_id = "kickai-test"
        "#,
    );

    let output = run(&["config"], &config, &dir.path().join("test.db"));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("********"));
    assert!(!stdout.contains("super-secret-key"));
}
