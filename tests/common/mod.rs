//! Common test utilities and helpers
//!
//! CLI helpers run the `trumpet` binary inside an isolated temp home;
//! pipeline helpers provide recording sinks and a local HTTP server.

#![allow(dead_code)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use trumpet::render::{BatchCallback, RenderSink};
use trumpet::Notification;

/// Test command builder for the trumpet CLI
pub struct TestCommand {
    cmd: Command,
}

impl TestCommand {
    /// Create a command whose user directories all point into `home`
    pub fn new(home: &Path) -> Self {
        let mut cmd = Command::cargo_bin("trumpet").expect("Failed to find trumpet binary");
        cmd.env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join("config"))
            .env("XDG_DATA_HOME", home.join("data"))
            .env_remove("TRUMPET_BASE_URL")
            .env_remove("TRUMPET_ENDPOINT")
            .env_remove("RUST_LOG");
        Self { cmd }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.cmd.arg(arg.as_ref());
        }
        self
    }

    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.cmd.arg(arg.as_ref());
        self
    }

    pub fn expect_success(mut self) -> TestAssertion {
        let assert = self.cmd.assert().success();
        TestAssertion { assert }
    }

    pub fn expect_failure(mut self) -> TestAssertion {
        let assert = self.cmd.assert().failure();
        TestAssertion { assert }
    }
}

/// Test assertion wrapper with convenient methods
pub struct TestAssertion {
    assert: assert_cmd::assert::Assert,
}

impl TestAssertion {
    pub fn stdout_contains<S: AsRef<str>>(self, text: S) -> Self {
        let assert = self.assert.stdout(predicate::str::contains(text.as_ref()));
        Self { assert }
    }

    pub fn stdout_contains_all<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.assert = self.assert.stdout(predicate::str::contains(pattern.as_ref()));
        }
        self
    }

    pub fn stderr_contains<S: AsRef<str>>(self, text: S) -> Self {
        let assert = self.assert.stderr(predicate::str::contains(text.as_ref()));
        Self { assert }
    }

    pub fn done(self) -> assert_cmd::assert::Assert {
        self.assert
    }
}

/// Isolated project and home directory for CLI tests
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn project_path(&self) -> PathBuf {
        self.temp_dir.path().join("project")
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_path().join(".trumpet").join("config.toml")
    }

    pub fn store_path(&self) -> PathBuf {
        self.temp_dir.path().join("seen.jsonl")
    }

    /// Write a project configuration file
    pub fn write_config(&self, content: &str) {
        let path = self.config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Command bound to this environment's home and project
    pub fn command(&self) -> TestCommand {
        std::fs::create_dir_all(self.project_path()).unwrap();
        TestCommand::new(self.temp_dir.path())
            .arg("--project")
            .arg(self.project_path().to_string_lossy())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Render sink remembering every notification it was given
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub rendered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn ids(&self) -> Vec<String> {
        self.rendered.lock().unwrap().iter().map(|n| n.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }
}

impl RenderSink for RecordingSink {
    fn render(&self, notification: &Notification) {
        self.rendered.lock().unwrap().push(notification.clone());
    }
}

/// Batch callback remembering the ids of every batch
#[derive(Clone, Default)]
pub struct RecordingCallback {
    pub batches: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingCallback {
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

impl BatchCallback for RecordingCallback {
    fn on_batch(&self, batch: &[Notification]) {
        self.batches
            .lock()
            .unwrap()
            .push(batch.iter().map(|n| n.id.clone()).collect());
    }
}

/// Serve `app` on an ephemeral local port
pub async fn spawn_server(app: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
