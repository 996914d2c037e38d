use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::{BatchHandler, StopSignal, TransportDriver, BATCH_EVENT, ERROR_EVENT};
use crate::config::{TransportConfig, TransportKind};
use crate::errors::{AppError, AppResult};
use crate::notification::RawBatch;
use crate::retry::RetryConfig;

/// Persistent WebSocket driver
///
/// Frames are JSON events, either `{"event": name, "data": payload}` or
/// `[name, payload]` (optionally behind a numeric packet prefix such as
/// `42`). `trumpet` events carry the batch object itself; `error` events are
/// logged and do not end the connection. A lost connection is re-established
/// with backoff until the pipeline stops.
pub struct SocketDriver {
    url: Url,
    headers: BTreeMap<String, String>,
    reconnect: RetryConfig,
}

/// One decoded socket event
#[derive(Debug, Clone, PartialEq)]
pub struct SocketFrame {
    pub event: String,
    pub data: Value,
}

impl SocketFrame {
    /// Decode a text frame; `Ok(None)` for frames that carry no event
    pub fn parse(text: &str) -> AppResult<Option<Self>> {
        let body = text.trim_start_matches(|c: char| c.is_ascii_digit()).trim();
        if body.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(body).map_err(|e| AppError::MalformedBatch {
            context: "socket frame is not valid JSON".to_string(),
            source: Some(Box::new(e)),
        })?;

        match value {
            Value::Object(mut map) => match map.remove("event") {
                Some(Value::String(event)) => Ok(Some(Self {
                    event,
                    data: map.remove("data").unwrap_or(Value::Null),
                })),
                _ => Err(AppError::malformed_batch("socket frame has no event name")),
            },
            Value::Array(items) => {
                let mut items = items.into_iter();
                match items.next() {
                    Some(Value::String(event)) => Ok(Some(Self {
                        event,
                        data: items.next().unwrap_or(Value::Null),
                    })),
                    _ => Err(AppError::malformed_batch("socket frame has no event name")),
                }
            }
            _ => Err(AppError::malformed_batch("socket frame is not an event")),
        }
    }
}

impl SocketDriver {
    pub fn new(config: &TransportConfig) -> AppResult<Self> {
        Ok(Self {
            url: socket_url(config)?,
            headers: config.headers.clone(),
            reconnect: RetryConfig::reconnect(),
        })
    }

    pub fn with_reconnect(mut self, reconnect: RetryConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The batch carried by a text frame, if any
    fn batch_from_frame(&self, text: &str) -> Option<RawBatch> {
        let frame = match SocketFrame::parse(text) {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!("Skipping socket frame: {}", e);
                return None;
            }
        };

        match frame.event.as_str() {
            BATCH_EVENT => match RawBatch::from_value(frame.data) {
                Ok(batch) => {
                    debug!("Received batch of {} items", batch.len());
                    return Some(batch);
                }
                Err(e) => warn!("Skipping malformed {} event: {}", BATCH_EVENT, e),
            },
            ERROR_EVENT => error!("Socket error event from {}: {}", self.url, frame.data),
            other => trace!("Ignoring socket event '{}'", other),
        }
        None
    }

    async fn connect_once(&self, on_batch: &BatchHandler, attempt: &mut u32) -> AppResult<()> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| AppError::transport_with_source("socket", "invalid socket request", e))?;
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::config_with_source(format!("Invalid header name '{name}'"), e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AppError::config_with_source("Invalid socket header value", e))?;
            request.headers_mut().insert(name, value);
        }

        let (mut stream, _) = connect_async(request)
            .await
            .map_err(|e| AppError::transport_with_source("socket", format!("failed to connect to {}", self.url), e))?;
        info!("Socket connected to {}", self.url);
        *attempt = 0;

        while let Some(message) = stream.next().await {
            let message = message
                .map_err(|e| AppError::transport_with_source("socket", "socket read failed", e))?;
            let batch = match message {
                Message::Text(text) => self.batch_from_frame(&text),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => self.batch_from_frame(&text),
                    Err(_) => {
                        warn!("Skipping non UTF-8 binary socket frame");
                        None
                    }
                },
                Message::Close(frame) => {
                    debug!("Socket closed by server: {:?}", frame);
                    break;
                }
                _ => None,
            };
            if let Some(batch) = batch {
                on_batch(batch).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransportDriver for SocketDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }

    async fn run(&self, on_batch: BatchHandler, stop: StopSignal) -> AppResult<()> {
        let mut attempt = 0u32;

        while !stop.is_stopped() {
            let outcome = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                outcome = self.connect_once(&on_batch, &mut attempt) => outcome,
            };

            let delay = self.reconnect.calculate_delay(attempt);
            attempt = attempt.saturating_add(1);
            match outcome {
                Ok(()) => info!("Socket to {} closed, reconnecting in {:?}", self.url, delay),
                Err(e) => warn!("Socket to {} failed, reconnecting in {:?}: {}", self.url, delay, e),
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = sleep(delay) => {}
            }
        }
        Ok(())
    }
}

/// Endpoint URL with `http`/`https` mapped to `ws`/`wss`
pub fn socket_url(config: &TransportConfig) -> AppResult<Url> {
    let mut url = config.endpoint_url()?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();
    url.set_scheme(&scheme)
        .map_err(|_| AppError::config(format!("Cannot use '{url}' as a socket URL")))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object_and_array_frames() {
        let frame = SocketFrame::parse(r#"{"event":"trumpet","data":{"n1":{}}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(frame.event, "trumpet");
        assert_eq!(frame.data, json!({"n1": {}}));

        let frame = SocketFrame::parse(r#"42["error","boom"]"#).unwrap().unwrap();
        assert_eq!(frame.event, "error");
        assert_eq!(frame.data, json!("boom"));

        assert_eq!(SocketFrame::parse("3").unwrap(), None);
        assert!(SocketFrame::parse(r#"{"data":1}"#).is_err());
        assert!(SocketFrame::parse("nope").is_err());
    }

    #[test]
    fn test_socket_url_maps_scheme() {
        let config = TransportConfig {
            base_url: "https://push.example.com/".into(),
            endpoint: "live".into(),
            ..Default::default()
        };
        assert_eq!(socket_url(&config).unwrap().as_str(), "wss://push.example.com/live");

        let config = TransportConfig {
            endpoint: "ws://127.0.0.1:9000/socket".into(),
            ..Default::default()
        };
        assert_eq!(socket_url(&config).unwrap().as_str(), "ws://127.0.0.1:9000/socket");
    }
}
