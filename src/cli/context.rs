//! CLI context: resolved project path, configuration and logging setup

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use trumpet::config::{ConfigFile, ConfigManager};

/// Shared state handed to every command handler
#[derive(Clone)]
pub struct CliContext {
    pub project_path: Option<PathBuf>,
    pub verbose: bool,
    pub config_manager: Arc<ConfigManager>,
}

impl CliContext {
    pub fn new(project_path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let project_path = project_path.or_else(Self::project_in_current_dir);
        let config_manager = ConfigManager::new(project_path.clone())
            .context("Failed to load trumpet configuration")?;

        Ok(Self {
            project_path,
            verbose,
            config_manager: Arc::new(config_manager),
        })
    }

    /// The current directory, if it carries a `.trumpet/config.toml`
    fn project_in_current_dir() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .filter(|dir| ConfigManager::project_config_path(dir).exists())
    }

    pub fn file(&self) -> &ConfigFile {
        self.config_manager.file()
    }

    /// Log to stderr, and to a daily rolling file when `logging.path` is set
    ///
    /// `RUST_LOG` takes precedence over the configured level; `--verbose`
    /// raises the base level to debug. Keep the returned guard alive until
    /// exit so the file writer flushes.
    pub fn init_logging(&self) -> Result<Option<WorkerGuard>> {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{fmt, EnvFilter};

        let logging = &self.file().logging;
        let level = if self.verbose { "debug" } else { logging.level.as_str() };
        let filter = EnvFilter::from_default_env()
            .add_directive(level.parse().unwrap_or_else(|_| tracing::Level::INFO.into()));

        let (file_layer, guard) = match &logging.path {
            Some(path) => {
                let directory = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                std::fs::create_dir_all(directory)
                    .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

                let appender = tracing_appender::rolling::daily(
                    directory,
                    path.file_name().unwrap_or_else(|| OsStr::new("trumpet.log")),
                );
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .try_init()
            .context("Failed to initialize logging")?;

        tracing::debug!(
            project = ?self.project_path,
            config = %self.config_manager.config_path().display(),
            "Logging initialized"
        );
        Ok(guard)
    }
}
