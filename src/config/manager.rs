use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Options, PayloadSchema, Position, TransportKind, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SERVER_BASE_URL};
use crate::errors::{AppError, AppResult};

const PROJECT_CONFIG_DIR: &str = ".trumpet";
const CONFIG_FILE_NAME: &str = "config.toml";
const STORE_FILE_NAME: &str = "seen.jsonl";

/// On-disk configuration: the pipeline options plus process-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub options: Options,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub terminal: TerminalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Dedup store file; defaults to the user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub width: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            template: None,
            width: 80,
        }
    }
}

impl ConfigFile {
    /// The file written by `trumpet init`: built-in defaults spelled out
    ///
    /// The endpoint is left out on purpose, an explicit empty endpoint is
    /// rejected by the validator.
    pub fn with_defaults() -> Self {
        Self {
            options: Options {
                server_base_url: Some(DEFAULT_SERVER_BASE_URL.to_string()),
                poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS as i64),
                api_type: Some(TransportKind::HttpPoll),
                position: Some(Position::TopRight),
                use_toast: Some(false),
                payload: Some(PayloadSchema::default()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Configuration manager
///
/// Looks for a project-level file first (`<project>/.trumpet/config.toml`),
/// then the global file in the platform config directory. Missing files are
/// not an error: the manager then holds the defaults and remembers where a
/// file would be written.
pub struct ConfigManager {
    config_path: PathBuf,
    file: ConfigFile,
    loaded: bool,
}

impl ConfigManager {
    pub fn new(project_path: Option<PathBuf>) -> AppResult<Self> {
        if let Some(project) = project_path {
            let project_config = Self::project_config_path(&project);
            if project_config.exists() {
                return Self::from_path(project_config);
            }

            if let Ok(global_config) = Self::global_config_path() {
                if global_config.exists() {
                    return Self::from_path(global_config);
                }
            }

            return Ok(Self {
                config_path: project_config,
                file: ConfigFile::default(),
                loaded: false,
            });
        }

        let global_config = Self::global_config_path()?;
        if global_config.exists() {
            Self::from_path(global_config)
        } else {
            Ok(Self {
                config_path: global_config,
                file: ConfigFile::default(),
                loaded: false,
            })
        }
    }

    /// Load a specific configuration file
    pub fn from_path(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::ConfigNotFound { path: path.clone() }
            } else {
                AppError::io_with_source(&path, "read config file", e)
            }
        })?;
        let file = toml::from_str(&content)
            .map_err(|e| AppError::config_with_source(format!("Failed to parse {}", path.display()), e))?;

        Ok(Self {
            config_path: path,
            file,
            loaded: true,
        })
    }

    /// Write a default configuration file, refusing to clobber unless forced
    pub fn init(path: impl Into<PathBuf>, force: bool) -> AppResult<Self> {
        let path = path.into();
        if path.exists() && !force {
            return Err(AppError::config(format!(
                "Configuration already exists at {} (use --force to overwrite)",
                path.display()
            )));
        }

        let manager = Self {
            config_path: path,
            file: ConfigFile::with_defaults(),
            loaded: true,
        };
        manager.save()?;
        Ok(manager)
    }

    pub fn project_config_path(project: &Path) -> PathBuf {
        project.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    pub fn global_config_path() -> AppResult<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn default_store_path() -> AppResult<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join(STORE_FILE_NAME))
    }

    fn project_dirs() -> AppResult<ProjectDirs> {
        ProjectDirs::from("", "", "trumpet")
            .ok_or_else(|| AppError::config("Failed to resolve the user configuration directory"))
    }

    /// Persist the configuration to the path it was loaded from
    pub fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io_with_source(parent, "create config directory", e))?;
        }
        let content = toml::to_string_pretty(&self.file)
            .map_err(|e| AppError::config_with_source("Failed to serialize config", e))?;
        fs::write(&self.config_path, content)
            .map_err(|e| AppError::io_with_source(&self.config_path, "write config file", e))?;
        Ok(())
    }

    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut ConfigFile {
        &mut self.file
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Whether the configuration came from a file on disk
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Dedup store location: configured path or the default data file
    pub fn store_path(&self) -> AppResult<PathBuf> {
        match &self.file.store.path {
            Some(path) => Ok(path.clone()),
            None => Self::default_store_path(),
        }
    }
}
