//! Configuration validation
//!
//! Runs before a pipeline starts. Every check is independent and every
//! failure is collected, so a caller sees all problems at once. Validation
//! is strict: [`ConfigValidator::validate`] logs each issue and fails with
//! [`AppError::InvalidConfig`]; nothing is started on failure.

use reqwest::header::{HeaderName, HeaderValue};
use tracing::error;
use url::Url;

use super::{Config, Options, TransportKind};
use crate::errors::{AppError, AppResult, ConfigIssue};

/// Optional collaborators available to the pipeline being configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A toast renderer has been registered
    pub toast_renderer: bool,
    /// A socket-capable transport can be created
    pub socket_transport: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            toast_renderer: false,
            socket_transport: cfg!(feature = "socket"),
        }
    }
}

pub struct ConfigValidator {
    capabilities: Capabilities,
}

impl ConfigValidator {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// Report every issue without failing
    ///
    /// `options` are the explicitly supplied values, `config` the merged
    /// result. Some checks only apply to explicit values: an omitted endpoint
    /// falls back to the default, an explicitly empty one is rejected.
    pub fn check(&self, options: &Options, config: &Config) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        self.check_endpoint(options, config, &mut issues);
        self.check_poll_interval(options, &mut issues);
        self.check_callback(config, &mut issues);
        self.check_headers(config, &mut issues);
        self.check_capabilities(config, &mut issues);

        issues
    }

    /// Fail with every issue found, logging each one
    pub fn validate(&self, options: &Options, config: &Config) -> AppResult<()> {
        let issues = self.check(options, config);
        if issues.is_empty() {
            return Ok(());
        }

        for issue in &issues {
            error!(field = %issue.field, "trumpet configuration: {}", issue.reason);
        }
        Err(AppError::InvalidConfig { issues })
    }

    fn check_endpoint(&self, options: &Options, config: &Config, issues: &mut Vec<ConfigIssue>) {
        if matches!(&options.notifications_endpoint, Some(endpoint) if endpoint.trim().is_empty()) {
            issues.push(ConfigIssue::new(
                "notifications_endpoint",
                "requires a notifications endpoint to GET notifications from",
            ));
            return;
        }

        if let Err(e) = config.transport.endpoint_url() {
            issues.push(ConfigIssue::new("notifications_endpoint", e.to_string()));
        }
    }

    fn check_poll_interval(&self, options: &Options, issues: &mut Vec<ConfigIssue>) {
        if let Some(ms) = options.poll_interval_ms {
            if ms <= 0 {
                issues.push(ConfigIssue::new(
                    "poll_interval_ms",
                    format!("can only accept a positive integer, got {ms}"),
                ));
            }
        }
    }

    fn check_callback(&self, config: &Config, issues: &mut Vec<ConfigIssue>) {
        let Some(callback_url) = &config.callback_url else {
            return;
        };

        match Url::parse(callback_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => issues.push(ConfigIssue::new(
                "callback_url",
                format!("can only call back over http or https, got '{}'", url.scheme()),
            )),
            Err(e) => issues.push(ConfigIssue::new(
                "callback_url",
                format!("'{callback_url}' is not a callable URL: {e}"),
            )),
        }
    }

    fn check_headers(&self, config: &Config, issues: &mut Vec<ConfigIssue>) {
        for (name, value) in &config.transport.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                issues.push(ConfigIssue::new(
                    "endpoint_headers",
                    format!("'{name}' is not a valid header name"),
                ));
            } else if HeaderValue::from_str(value).is_err() {
                issues.push(ConfigIssue::new(
                    "endpoint_headers",
                    format!("value of '{name}' is not a valid header value"),
                ));
            }
        }
    }

    fn check_capabilities(&self, config: &Config, issues: &mut Vec<ConfigIssue>) {
        if config.use_toast && !self.capabilities.toast_renderer {
            issues.push(ConfigIssue::new(
                "use_toast",
                "toast rendering was requested but no toast renderer is registered; configure [toast] or disable use_toast",
            ));
        }

        if config.transport.kind == TransportKind::Socket && !self.capabilities.socket_transport {
            issues.push(ConfigIssue::new(
                "api_type",
                "socket transport requested but socket support is not available in this build",
            ));
        }
    }
}
