//! Transport drivers
//!
//! A driver owns one network source and turns what it receives into
//! [`RawBatch`]es. The driver awaits the handler for each batch, so it never
//! fetches the next batch before the current one has been dispatched.
//! Processing itself, which touches the dedup store file and the terminal,
//! runs on tokio's blocking pool.

pub mod factory;
pub mod http_poll;
#[cfg(feature = "socket")]
pub mod socket;
pub mod sse;
pub mod stop;

pub use factory::{DefaultDriverFactory, DriverFactory};
pub use http_poll::HttpPollDriver;
#[cfg(feature = "socket")]
pub use socket::SocketDriver;
pub use sse::SseDriver;
pub use stop::StopSignal;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::TransportKind;
use crate::errors::{AppError, AppResult};
use crate::notification::RawBatch;

/// Event name carrying a batch on the SSE and socket transports
pub const BATCH_EVENT: &str = "trumpet";
/// Socket event carrying a transport error
pub const ERROR_EVENT: &str = "error";

pub type BatchHandler = Arc<dyn Fn(RawBatch) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap a synchronous batch consumer so each call runs on the blocking pool
pub fn blocking_handler<F>(process: F) -> BatchHandler
where
    F: Fn(RawBatch) + Send + Sync + 'static,
{
    let process = Arc::new(process);
    Arc::new(move |batch| {
        let process = process.clone();
        Box::pin(async move {
            if let Err(e) = tokio::task::spawn_blocking(move || process(batch)).await {
                error!("Batch processing failed: {}", e);
            }
        })
    })
}

#[async_trait]
pub trait TransportDriver: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Receive batches until `stop` fires or the driver hits a fatal error
    async fn run(&self, on_batch: BatchHandler, stop: StopSignal) -> AppResult<()>;
}

/// A driver running on its own task
pub struct DriverHandle {
    kind: TransportKind,
    stop: StopSignal,
    task: JoinHandle<AppResult<()>>,
}

impl DriverHandle {
    pub fn stop(&self) {
        self.stop.trigger();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the driver task to end
    pub async fn join(self) -> AppResult<()> {
        self.task
            .await
            .map_err(|e| AppError::internal(format!("{} driver task failed: {e}", self.kind)))?
    }
}

/// Spawn `driver` on the current tokio runtime
pub fn start(driver: Box<dyn TransportDriver>, on_batch: BatchHandler, stop: StopSignal) -> DriverHandle {
    let kind = driver.kind();
    let task_stop = stop.clone();
    let task = tokio::spawn(async move {
        info!("Starting {} transport", kind);
        let result = driver.run(on_batch, task_stop).await;
        match &result {
            Ok(()) => info!("{} transport stopped", kind),
            Err(e) => error!(category = e.category(), "{} transport ended: {}", kind, e),
        }
        result
    });

    DriverHandle { kind, stop, task }
}

/// Convert configured endpoint headers into a request header map
pub fn header_map(headers: &BTreeMap<String, String>) -> AppResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            AppError::config_with_source(format!("Invalid header name '{name}'"), e)
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            AppError::config_with_source(format!("Invalid value for header '{name}'"), e)
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
