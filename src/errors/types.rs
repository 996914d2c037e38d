//! Error types for the trumpet notification pipeline
//!
//! Variants are grouped by the stage that produces them: configuration,
//! transport, storage and rendering, plus the I/O and JSON failures that
//! cross those stages.

use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// A single configuration problem found by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub reason: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ConfigIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum AppError {
    // Configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration ({}): {}", .issues.len(), join_issues(.issues))]
    InvalidConfig { issues: Vec<ConfigIssue> },

    // Transport
    #[error("{transport} transport error: {message}")]
    Transport {
        transport: &'static str,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("{method} {url} failed")]
    HttpRequest {
        method: String,
        url: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("HTTP {status_code} from {url}")]
    HttpStatus { url: String, status_code: u16 },

    #[error("Request timed out")]
    NetworkTimeout,

    #[error("Malformed batch: {context}")]
    MalformedBatch {
        context: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Storage
    #[error("Dedup store {path}: {operation} failed")]
    Storage {
        path: PathBuf,
        operation: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Rendering
    #[error("Render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // I/O and serialization
    #[error("{operation} failed for {path}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("JSON error: {context}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transport(transport: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            transport,
            message: message.into(),
            source: None,
        }
    }

    pub fn transport_with_source(
        transport: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            transport,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn malformed_batch(context: impl Into<String>) -> Self {
        Self::MalformedBatch {
            context: context.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn render_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Render {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn io_with_source(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Transient network failures; worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout | Self::HttpRequest { .. } | Self::Transport { .. } => true,
            Self::HttpStatus { status_code, .. } => matches!(status_code, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    /// Pipeline stage the error came from, used as a log field
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::ConfigNotFound { .. } | Self::InvalidConfig { .. } => "config",
            Self::Transport { .. }
            | Self::HttpRequest { .. }
            | Self::HttpStatus { .. }
            | Self::NetworkTimeout
            | Self::MalformedBatch { .. } => "transport",
            Self::Storage { .. } => "storage",
            Self::Render { .. } => "render",
            Self::Io { .. } | Self::Json { .. } => "io",
            Self::Internal { .. } => "internal",
        }
    }

    /// Issues carried by an `InvalidConfig` error, empty otherwise
    pub fn config_issues(&self) -> &[ConfigIssue] {
        match self {
            Self::InvalidConfig { issues } => issues,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            operation: err.kind().to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        let context = match err.classify() {
            serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
                format!("invalid JSON at line {} column {}", err.line(), err.column())
            }
            serde_json::error::Category::Data => "unexpected JSON shape".to_string(),
            serde_json::error::Category::Io => "JSON I/O".to_string(),
        };
        Self::Json {
            context,
            source: err,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            Self::NetworkTimeout
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                url,
                status_code: status.as_u16(),
            }
        } else {
            Self::HttpRequest {
                method: "GET".to_string(),
                url,
                source: Some(Box::new(err)),
            }
        }
    }
}
