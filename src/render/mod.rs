//! Render sinks and batch callbacks
//!
//! Both are synchronous boundaries invoked from dispatch. Anything slow
//! (network delivery) is handed to the outbound queue instead of blocking.

pub mod terminal;
pub mod toast;
pub mod webhook;

pub use terminal::TerminalSink;
pub use toast::NtfyToastSink;
pub use webhook::WebhookCallback;

use crate::notification::Notification;

/// Displays one notification
pub trait RenderSink: Send + Sync {
    fn render(&self, notification: &Notification);
}

/// Receives every batch that produced at least one new notification
pub trait BatchCallback: Send + Sync {
    fn on_batch(&self, batch: &[Notification]);
}

impl<F> BatchCallback for F
where
    F: Fn(&[Notification]) + Send + Sync,
{
    fn on_batch(&self, batch: &[Notification]) {
        self(batch)
    }
}

/// Sink that drops everything, for embedders that only want the callback
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&self, _notification: &Notification) {}
}
