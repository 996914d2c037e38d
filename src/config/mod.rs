//! Configuration model for the trumpet pipeline
//!
//! [`Options`] is the user-facing configuration object: every field optional,
//! loadable from TOML or built in code. [`Config`] is the effective,
//! immutable configuration a pipeline runs with, produced by
//! [`Config::merge`] from explicit options, the previously effective config
//! and the built-in defaults, in that priority order.

pub mod manager;
pub mod validator;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::errors::{AppError, AppResult};

pub use manager::{ConfigFile, ConfigManager, LoggingConfig, StoreConfig, TerminalConfig};
pub use validator::{Capabilities, ConfigValidator};

pub const DEFAULT_SERVER_BASE_URL: &str = "http://localhost:3001/";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_TOAST_SERVER_URL: &str = "https://ntfy.sh";
pub const DEFAULT_TOAST_TOPIC: &str = "trumpet";

/// Transport used to receive batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    HttpPoll,
    Sse,
    Socket,
}

impl TransportKind {
    /// Numeric API type code: 0 = HTTP polling, 1 = SSE, 2 = socket
    pub fn code(self) -> u8 {
        match self {
            Self::HttpPoll => 0,
            Self::Sse => 1,
            Self::Socket => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::HttpPoll),
            1 => Some(Self::Sse),
            2 => Some(Self::Socket),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HttpPoll => "http_poll",
            Self::Sse => "sse",
            Self::Socket => "socket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "0" | "http_poll" | "poll" | "http" | "short_polling" => Ok(Self::HttpPoll),
            "1" | "sse" | "event_stream" => Ok(Self::Sse),
            "2" | "socket" | "websocket" | "ws" => Ok(Self::Socket),
            _ => Err(format!(
                "unknown api type '{s}', expected http_poll (0), sse (1) or socket (2)"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for TransportKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Self::from_code(code).ok_or_else(|| {
                de::Error::custom(format!("unknown api type {code}, expected 0, 1 or 2"))
            }),
            Repr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// Placement hint handed to the render sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    Top,
    #[default]
    #[serde(alias = "top_right")]
    TopRight,
    #[serde(alias = "top_left")]
    TopLeft,
    Bottom,
    #[serde(alias = "bottom_right")]
    BottomRight,
    #[serde(alias = "bottom_left")]
    BottomLeft,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "top" => Ok(Self::Top),
            "topright" => Ok(Self::TopRight),
            "topleft" => Ok(Self::TopLeft),
            "bottom" => Ok(Self::Bottom),
            "bottomright" => Ok(Self::BottomRight),
            "bottomleft" => Ok(Self::BottomLeft),
            _ => Err(format!(
                "unknown position '{s}', expected top, topRight, topLeft, bottom, bottomRight or bottomLeft"
            )),
        }
    }
}

/// Names of the raw payload keys mapped into the canonical notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadSchema {
    #[serde(alias = "titleField")]
    pub title_field: String,
    #[serde(alias = "messageField")]
    pub message_field: String,
    #[serde(alias = "notificationTypeField", alias = "typeField")]
    pub type_field: String,
    #[serde(alias = "timeStampField", alias = "timestampField")]
    pub timestamp_field: String,
}

impl Default for PayloadSchema {
    fn default() -> Self {
        Self {
            title_field: "title".to_string(),
            message_field: "message".to_string(),
            type_field: "type".to_string(),
            timestamp_field: "timestamp".to_string(),
        }
    }
}

/// Settings for the toast renderer (ntfy push)
///
/// `settings` is passed through unmodified into every published message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastOptions {
    pub server_url: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl Default for ToastOptions {
    fn default() -> Self {
        let mut settings = serde_json::Map::new();
        settings.insert("priority".to_string(), serde_json::json!(3));
        Self {
            server_url: DEFAULT_TOAST_SERVER_URL.to_string(),
            topic: DEFAULT_TOAST_TOPIC.to_string(),
            auth_token: None,
            timeout_secs: Some(30),
            settings,
        }
    }
}

/// Configuration object supplied to [`crate::Pipeline::init`]
///
/// Every field is optional. Omitted fields fall back to the previously
/// effective value, then to the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    #[serde(alias = "serverBaseUrl", skip_serializing_if = "Option::is_none")]
    pub server_base_url: Option<String>,
    #[serde(alias = "notificationsEndpoint", skip_serializing_if = "Option::is_none")]
    pub notifications_endpoint: Option<String>,
    #[serde(alias = "pollIntervalMs", skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<i64>,
    #[serde(alias = "apiType", skip_serializing_if = "Option::is_none")]
    pub api_type: Option<TransportKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(alias = "useToast", skip_serializing_if = "Option::is_none")]
    pub use_toast: Option<bool>,
    #[serde(alias = "callbackUrl", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(alias = "endpointHeaders", skip_serializing_if = "Option::is_none")]
    pub endpoint_headers: Option<BTreeMap<String, String>>,
    #[serde(alias = "responsePayloadStructure", skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toast: Option<ToastOptions>,
}

impl Options {
    /// Field-wise overlay: values set in `other` win over values in `self`
    pub fn overlay(self, other: Options) -> Options {
        Options {
            server_base_url: other.server_base_url.or(self.server_base_url),
            notifications_endpoint: other.notifications_endpoint.or(self.notifications_endpoint),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            api_type: other.api_type.or(self.api_type),
            position: other.position.or(self.position),
            use_toast: other.use_toast.or(self.use_toast),
            callback_url: other.callback_url.or(self.callback_url),
            endpoint_headers: match (self.endpoint_headers, other.endpoint_headers) {
                (Some(mut base), Some(extra)) => {
                    base.extend(extra);
                    Some(base)
                }
                (base, extra) => extra.or(base),
            },
            payload: other.payload.or(self.payload),
            toast: other.toast.or(self.toast),
        }
    }
}

/// Transport settings shared by every driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub base_url: String,
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    /// Only consulted by the HTTP polling driver
    pub poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            base_url: DEFAULT_SERVER_BASE_URL.to_string(),
            endpoint: String::new(),
            headers: BTreeMap::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl TransportConfig {
    /// Resolve the URL the driver connects to
    ///
    /// An absolute endpoint is used as-is; otherwise it is appended to the base
    /// URL with exactly one `/` between them.
    pub fn endpoint_url(&self) -> AppResult<Url> {
        if let Ok(url) = Url::parse(&self.endpoint) {
            if matches!(url.scheme(), "http" | "https" | "ws" | "wss") && url.has_host() {
                return Ok(url);
            }
        }

        let joined = join_endpoint(&self.base_url, &self.endpoint);
        Url::parse(&joined).map_err(|e| {
            AppError::config_with_source(format!("Invalid notifications URL '{joined}'"), e)
        })
    }
}

fn join_endpoint(base: &str, endpoint: &str) -> String {
    if endpoint.is_empty() {
        return base.to_string();
    }
    match (base.ends_with('/'), endpoint.starts_with('/')) {
        (true, true) => format!("{base}{}", &endpoint[1..]),
        (false, false) => format!("{base}/{endpoint}"),
        _ => format!("{base}{endpoint}"),
    }
}

/// Effective configuration of one pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub transport: TransportConfig,
    pub payload: PayloadSchema,
    pub position: Position,
    pub use_toast: bool,
    pub toast: ToastOptions,
    pub callback_url: Option<String>,
}

impl Config {
    /// Merge explicit options over the previous config over the defaults
    ///
    /// Empty strings and non-positive intervals count as "not supplied" here;
    /// rejecting them is the validator's job.
    pub fn merge(previous: Option<&Config>, options: &Options) -> Config {
        let defaults = Config::default();
        let prev = previous.unwrap_or(&defaults);

        Config {
            transport: TransportConfig {
                kind: options.api_type.unwrap_or(prev.transport.kind),
                base_url: non_empty(&options.server_base_url)
                    .unwrap_or_else(|| prev.transport.base_url.clone()),
                endpoint: non_empty(&options.notifications_endpoint)
                    .unwrap_or_else(|| prev.transport.endpoint.clone()),
                headers: options
                    .endpoint_headers
                    .clone()
                    .unwrap_or_else(|| prev.transport.headers.clone()),
                poll_interval: options
                    .poll_interval_ms
                    .filter(|ms| *ms > 0)
                    .map(|ms| Duration::from_millis(ms as u64))
                    .unwrap_or(prev.transport.poll_interval),
            },
            payload: options.payload.clone().unwrap_or_else(|| prev.payload.clone()),
            position: options.position.unwrap_or(prev.position),
            use_toast: options.use_toast.unwrap_or(prev.use_toast),
            toast: options.toast.clone().unwrap_or_else(|| prev.toast.clone()),
            callback_url: non_empty(&options.callback_url).or_else(|| prev.callback_url.clone()),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}
