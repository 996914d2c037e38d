mod common;

use common::TestEnvironment;

#[test]
fn test_cli_help() {
    let env = TestEnvironment::new();
    env.command()
        .arg("--help")
        .expect_success()
        .stdout_contains_all(["listen", "check", "seen", "init"])
        .done();
}

#[test]
fn test_cli_version() {
    let env = TestEnvironment::new();
    env.command()
        .arg("--version")
        .expect_success()
        .stdout_contains("trumpet")
        .done();
}

#[test]
fn test_init_command() {
    let env = TestEnvironment::new();
    env.command()
        .arg("init")
        .expect_success()
        .stdout_contains("Configuration initialized successfully")
        .done();

    assert!(env.config_path().exists());

    env.command()
        .arg("init")
        .expect_success()
        .stdout_contains("Use --force to overwrite")
        .done();
}

#[test]
fn test_config_show() {
    let env = TestEnvironment::new();
    env.command().arg("init").expect_success();

    env.command()
        .args(["config", "show"])
        .expect_success()
        .stdout_contains_all(["server_base_url", "poll_interval_ms = 10000", "[logging]"])
        .done();
}

#[test]
fn test_check_accepts_defaults() {
    let env = TestEnvironment::new();
    env.command()
        .arg("check")
        .expect_success()
        .stdout_contains("Configuration is valid")
        .stdout_contains("http://localhost:3001/")
        .done();
}

#[test]
fn test_check_reports_empty_endpoint() {
    let env = TestEnvironment::new();
    env.write_config("notifications_endpoint = \"\"\n");

    env.command()
        .arg("check")
        .expect_failure()
        .stdout_contains("notifications_endpoint")
        .done();
}

#[test]
fn test_check_reports_every_issue() {
    let env = TestEnvironment::new();
    env.command()
        .args(["check", "--toast", "--interval-ms", "-1", "--callback-url", "ftp://x"])
        .expect_failure()
        .stdout_contains_all(["use_toast", "poll_interval_ms", "callback_url"])
        .done();
}

#[test]
fn test_check_accepts_toast_with_section() {
    let env = TestEnvironment::new();
    env.write_config(
        r#"
notifications_endpoint = "notifications"
api_type = "sse"
use_toast = true

[toast]
topic = "alerts"
"#,
    );

    env.command()
        .arg("check")
        .expect_success()
        .stdout_contains_all(["sse", "http://localhost:3001/notifications", "ntfy toast"])
        .done();
}

#[test]
fn test_seen_list_and_clear() {
    let env = TestEnvironment::new();
    std::fs::write(
        env.store_path(),
        r#"{"trumpet:n1": {"id": "n1", "title": "", "message": "", "type": "", "timestamp": null}}"#,
    )
    .unwrap();
    let store = env.store_path().to_string_lossy().to_string();

    env.command()
        .args(["seen", "list", "--store", &store])
        .expect_success()
        .stdout_contains("trumpet:n1")
        .done();

    env.command()
        .args(["seen", "clear", "--store", &store])
        .expect_success()
        .stdout_contains("Cleared 1")
        .done();

    env.command()
        .args(["seen", "list", "--store", &store])
        .expect_success()
        .stdout_contains("No notifications recorded")
        .done();
}

#[test]
fn test_listen_refuses_invalid_config() {
    let env = TestEnvironment::new();
    let store = env.store_path().to_string_lossy().to_string();
    env.command()
        .args(["listen", "--endpoint", "", "--store", &store])
        .expect_failure()
        .stderr_contains("notifications_endpoint")
        .done();
}
