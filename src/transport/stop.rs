use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation token shared by a pipeline and its driver
///
/// Once triggered it stays triggered. Drivers await [`StopSignal::stopped`]
/// alongside every network wait and timer.
#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal has been triggered
    pub async fn stopped(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this cannot close early
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }
}
