//! Trumpet notification pipeline
//!
//! Receives notification batches from a server over HTTP polling,
//! server-sent events or a WebSocket, normalizes each item into a
//! [`Notification`], suppresses ids that were already delivered and hands
//! every new notification to a render sink and an optional batch callback.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod normalizer;
pub mod notification;
pub mod outbound;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod store;
pub mod transport;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigManager, Options, TransportKind};
pub use errors::{AppError, AppResult};
pub use notification::{Notification, RawBatch};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use render::{BatchCallback, RenderSink};
pub use store::DeduplicationStore;
