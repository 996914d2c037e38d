use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::{header_map, BatchHandler, StopSignal, TransportDriver, BATCH_EVENT};
use crate::config::{TransportConfig, TransportKind};
use crate::errors::{AppError, AppResult};
use crate::notification::RawBatch;

/// Reconnect delay used until the server sends a `retry:` field
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Server-sent events driver
///
/// Follows the EventSource reconnection model: when the stream ends or the
/// connection fails it waits for the current reconnect delay and reconnects,
/// sending `Last-Event-ID` once an event id has been seen. A non-2xx response
/// ends the driver. Only `trumpet` events are treated as batches.
pub struct SseDriver {
    client: Client,
    url: Url,
    headers: HeaderMap,
}

#[derive(Debug)]
struct StreamState {
    last_event_id: Option<String>,
    reconnect_delay: Duration,
}

impl SseDriver {
    pub fn new(config: &TransportConfig) -> AppResult<Self> {
        // No overall timeout, the stream is long-lived
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::transport_with_source("sse", "failed to create HTTP client", e))?;

        let mut headers = header_map(&config.headers)?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        Ok(Self {
            client,
            url: config.endpoint_url()?,
            headers,
        })
    }

    async fn stream_once(&self, on_batch: &BatchHandler, state: &mut StreamState) -> AppResult<()> {
        let mut request = self.client.get(self.url.clone()).headers(self.headers.clone());
        if let Some(id) = &state.last_event_id {
            request = request.header(LAST_EVENT_ID, id.as_str());
        }

        let response = request.send().await.map_err(|e| AppError::HttpRequest {
            method: "GET".to_string(),
            url: self.url.to_string(),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: self.url.to_string(),
                status_code: status.as_u16(),
            });
        }
        info!("SSE stream connected to {}", self.url);

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| AppError::transport("sse", format!("event stream read failed: {e}")))?;

            if let Some(retry) = event.retry {
                state.reconnect_delay = retry;
            }
            if !event.id.is_empty() {
                state.last_event_id = Some(event.id.clone());
            }

            if event.event != BATCH_EVENT {
                trace!("Ignoring SSE event '{}'", event.event);
                continue;
            }

            match RawBatch::parse(&event.data) {
                Ok(batch) => {
                    debug!("Received batch of {} items", batch.len());
                    on_batch(batch).await;
                }
                Err(e) => warn!("Skipping malformed {} event: {}", BATCH_EVENT, e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransportDriver for SseDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    async fn run(&self, on_batch: BatchHandler, stop: StopSignal) -> AppResult<()> {
        let mut state = StreamState {
            last_event_id: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        };

        while !stop.is_stopped() {
            let outcome = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                outcome = self.stream_once(&on_batch, &mut state) => outcome,
            };

            match outcome {
                Ok(()) => info!(
                    "SSE stream from {} closed, reconnecting in {:?}",
                    self.url, state.reconnect_delay
                ),
                Err(e @ AppError::HttpStatus { .. }) => return Err(e),
                Err(e) => warn!(
                    "SSE connection to {} failed, reconnecting in {:?}: {}",
                    self.url, state.reconnect_delay, e
                ),
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = sleep(state.reconnect_delay) => {}
            }
        }
        Ok(())
    }
}
