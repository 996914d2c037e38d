//! Error handling
//!
//! Library code returns [`AppResult`]; the binary converts to `anyhow` only at
//! its outermost layer.

pub mod types;

pub use types::{AppError, AppResult, ConfigIssue};
