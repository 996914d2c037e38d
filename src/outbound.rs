//! Background delivery of render and callback output
//!
//! Sinks run synchronously inside dispatch, so anything that talks to the
//! network only enqueues an [`OutboundRequest`]. A single [`OutboundWorker`]
//! task drains the queue and POSTs each request, retrying transient failures.

use flume::{Receiver, Sender};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::errors::{AppError, AppResult};
use crate::retry::RetryConfig;

/// A JSON POST waiting to be delivered
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub target: String,
    pub body: Value,
    pub bearer: Option<String>,
}

impl OutboundRequest {
    pub fn json(target: impl Into<String>, body: Value) -> Self {
        Self {
            target: target.into(),
            body,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Cloneable producer side of the delivery queue
#[derive(Clone)]
pub struct OutboundQueue {
    sender: Sender<OutboundRequest>,
}

impl OutboundQueue {
    /// Queue a request; returns false if the worker is gone
    pub fn enqueue(&self, request: OutboundRequest) -> bool {
        let target = request.target.clone();
        match self.sender.send(request) {
            Ok(()) => true,
            Err(_) => {
                warn!("Outbound worker stopped, dropping delivery to {}", target);
                false
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

pub struct OutboundWorker {
    client: Client,
    receiver: Receiver<OutboundRequest>,
    retry: RetryConfig,
}

/// Create a delivery queue and the worker that drains it
///
/// The worker finishes once every [`OutboundQueue`] clone has been dropped
/// and the remaining requests are delivered.
pub fn channel(retry: RetryConfig, timeout: Duration) -> AppResult<(OutboundQueue, OutboundWorker)> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("trumpet/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::internal(format!("Failed to create outbound HTTP client: {e}")))?;

    let (sender, receiver) = flume::unbounded();
    Ok((
        OutboundQueue { sender },
        OutboundWorker {
            client,
            receiver,
            retry,
        },
    ))
}

impl OutboundWorker {
    pub async fn run(self) {
        info!("Outbound delivery worker started");

        while let Ok(request) = self.receiver.recv_async().await {
            if let Err(e) = self.deliver(&request).await {
                error!("Giving up on delivery to {}: {}", request.target, e);
            }
        }

        info!("Outbound delivery worker stopped");
    }

    /// Deliver one request, retrying transient failures
    pub async fn deliver(&self, request: &OutboundRequest) -> AppResult<()> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(()) => {
                    debug!("Delivered to {}", request.target);
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.calculate_delay(attempt);
                    attempt += 1;
                    warn!(
                        "Delivery to {} failed (attempt {}/{}), retrying in {:?}: {}",
                        request.target, attempt, self.retry.max_attempts, delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &OutboundRequest) -> AppResult<()> {
        let mut builder = self.client.post(&request.target).json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::NetworkTimeout
            } else {
                AppError::HttpRequest {
                    method: "POST".to_string(),
                    url: request.target.clone(),
                    source: Some(Box::new(e)),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: request.target.clone(),
                status_code: status.as_u16(),
            });
        }
        Ok(())
    }
}
