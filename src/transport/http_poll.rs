use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use super::{header_map, BatchHandler, StopSignal, TransportDriver};
use crate::config::{TransportConfig, TransportKind};
use crate::errors::{AppError, AppResult};
use crate::notification::RawBatch;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Short-polling driver
///
/// Each request carries a `ts=<epoch ms>` cache-buster. The next request is
/// scheduled `interval` after the previous one completed, whether it
/// succeeded or not; failures are logged and polling carries on.
pub struct HttpPollDriver {
    client: Client,
    url: Url,
    headers: HeaderMap,
    interval: Duration,
}

impl HttpPollDriver {
    pub fn new(config: &TransportConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::transport_with_source("http_poll", "failed to create HTTP client", e))?;

        Ok(Self {
            client,
            url: config.endpoint_url()?,
            headers: header_map(&config.headers)?,
            interval: config.poll_interval,
        })
    }

    /// Poll URL for a request sent at `ts` milliseconds since the epoch
    pub fn request_url(&self, ts: i64) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("ts", &ts.to_string());
        url
    }

    /// Fetch and parse one batch
    pub async fn poll_once(&self) -> AppResult<RawBatch> {
        let url = self.request_url(Utc::now().timestamp_millis());
        debug!("Polling {}", url);

        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::NetworkTimeout
                } else {
                    AppError::HttpRequest {
                        method: "GET".to_string(),
                        url: url.to_string(),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status_code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        RawBatch::parse(&body)
    }
}

#[async_trait]
impl TransportDriver for HttpPollDriver {
    fn kind(&self) -> TransportKind {
        TransportKind::HttpPoll
    }

    async fn run(&self, on_batch: BatchHandler, stop: StopSignal) -> AppResult<()> {
        while !stop.is_stopped() {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                result = self.poll_once() => match result {
                    Ok(batch) => {
                        debug!("Received batch of {} items", batch.len());
                        on_batch(batch).await;
                    }
                    Err(e) => warn!("Poll of {} failed, will retry in {:?}: {}", self.url, self.interval, e),
                },
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = sleep(self.interval) => {}
            }
        }
        Ok(())
    }
}
