use tracing::debug;

use crate::notification::Notification;
use crate::render::{BatchCallback, RenderSink};

/// Hands new notifications to the render sink and the batch callback
pub struct Dispatcher<'a> {
    sink: &'a dyn RenderSink,
    callback: Option<&'a dyn BatchCallback>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(sink: &'a dyn RenderSink, callback: Option<&'a dyn BatchCallback>) -> Self {
        Self { sink, callback }
    }

    /// Render each notification in order, then call back once with all of them
    ///
    /// The callback is skipped entirely when nothing was new.
    pub fn dispatch<I>(&self, notifications: I) -> Vec<Notification>
    where
        I: IntoIterator<Item = Notification>,
    {
        let mut arrived = Vec::new();
        for notification in notifications {
            self.sink.render(&notification);
            arrived.push(notification);
        }

        if let Some(callback) = self.callback {
            if !arrived.is_empty() {
                debug!("Invoking batch callback with {} notifications", arrived.len());
                callback.on_batch(&arrived);
            }
        }
        arrived
    }
}
