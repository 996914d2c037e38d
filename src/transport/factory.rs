use crate::config::{TransportConfig, TransportKind};
use crate::errors::AppResult;

use super::{HttpPollDriver, SseDriver, TransportDriver};

/// Creates the driver for a transport kind
pub trait DriverFactory: Send + Sync {
    /// Whether this factory can build a driver for `kind`
    fn supports(&self, kind: TransportKind) -> bool;

    fn create(&self, config: &TransportConfig) -> AppResult<Box<dyn TransportDriver>>;
}

/// Factory for the built-in drivers
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDriverFactory;

impl DriverFactory for DefaultDriverFactory {
    fn supports(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::HttpPoll | TransportKind::Sse => true,
            TransportKind::Socket => cfg!(feature = "socket"),
        }
    }

    fn create(&self, config: &TransportConfig) -> AppResult<Box<dyn TransportDriver>> {
        match config.kind {
            TransportKind::HttpPoll => Ok(Box::new(HttpPollDriver::new(config)?)),
            TransportKind::Sse => Ok(Box::new(SseDriver::new(config)?)),
            #[cfg(feature = "socket")]
            TransportKind::Socket => Ok(Box::new(super::SocketDriver::new(config)?)),
            #[cfg(not(feature = "socket"))]
            TransportKind::Socket => Err(crate::errors::AppError::transport(
                "socket",
                "socket support is not compiled into this build",
            )),
        }
    }
}
