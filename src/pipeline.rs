//! The notification pipeline
//!
//! A [`Pipeline`] owns its effective configuration, its collaborators and at
//! most one running transport driver. Batches flow through
//! normalize → dedup → dispatch on tokio's blocking pool, one batch at a
//! time per driver.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

use crate::config::{Capabilities, Config, ConfigValidator, Options, TransportKind};
use crate::dispatcher::Dispatcher;
use crate::errors::{AppError, AppResult};
use crate::normalizer::PayloadNormalizer;
use crate::notification::{Notification, RawBatch};
use crate::render::{BatchCallback, NullSink, RenderSink};
use crate::store::{DeduplicationStore, MemoryStore};
use crate::transport::{self, DefaultDriverFactory, DriverFactory, DriverHandle, StopSignal};

/// Counters describing what a pipeline has processed
#[derive(Debug, Default)]
pub struct PipelineStats {
    batches: AtomicU64,
    dispatched: AtomicU64,
    duplicates: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub batches: u64,
    pub dispatched: u64,
    pub duplicates: u64,
}

impl PipelineStats {
    fn record(&self, received: usize, dispatched: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.dispatched.fetch_add(dispatched as u64, Ordering::Relaxed);
        self.duplicates
            .fetch_add(received.saturating_sub(dispatched) as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}

pub struct PipelineBuilder {
    store: Arc<dyn DeduplicationStore>,
    render_sink: Arc<dyn RenderSink>,
    toast_sink: Option<Arc<dyn RenderSink>>,
    callback: Option<Arc<dyn BatchCallback>>,
    driver_factory: Arc<dyn DriverFactory>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            render_sink: Arc::new(NullSink),
            toast_sink: None,
            callback: None,
            driver_factory: Arc::new(DefaultDriverFactory),
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: impl DeduplicationStore + 'static) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Manual renderer, used unless toast rendering is enabled and available
    pub fn render_sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.render_sink = Arc::new(sink);
        self
    }

    pub fn toast_sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.toast_sink = Some(Arc::new(sink));
        self
    }

    pub fn callback(mut self, callback: impl BatchCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn driver_factory(mut self, factory: impl DriverFactory + 'static) -> Self {
        self.driver_factory = Arc::new(factory);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            core: Arc::new(PipelineCore {
                config: RwLock::new(None),
                store: self.store,
                render_sink: self.render_sink,
                toast_sink: self.toast_sink,
                callback: self.callback,
                stats: PipelineStats::default(),
            }),
            driver_factory: self.driver_factory,
            stop: StopSignal::new(),
            started: AtomicBool::new(false),
            driver: Mutex::new(None),
        }
    }
}

/// State shared between the pipeline handle and its driver task
struct PipelineCore {
    config: RwLock<Option<Arc<Config>>>,
    store: Arc<dyn DeduplicationStore>,
    render_sink: Arc<dyn RenderSink>,
    toast_sink: Option<Arc<dyn RenderSink>>,
    callback: Option<Arc<dyn BatchCallback>>,
    stats: PipelineStats,
}

impl PipelineCore {
    fn config(&self) -> Option<Arc<Config>> {
        self.config.read().ok().and_then(|config| config.clone())
    }

    fn publish(&self, config: Option<Arc<Config>>) {
        if let Ok(mut current) = self.config.write() {
            *current = config;
        }
    }

    fn sink_for(&self, config: &Config) -> &dyn RenderSink {
        match (&self.toast_sink, config.use_toast) {
            (Some(toast), true) => toast.as_ref(),
            _ => self.render_sink.as_ref(),
        }
    }

    fn process_batch(&self, batch: RawBatch) -> Vec<Notification> {
        let config = self.config().unwrap_or_default();
        let received = batch.len();

        let normalizer = PayloadNormalizer::new(config.payload.clone());
        let dispatcher = Dispatcher::new(self.sink_for(&config), self.callback.as_deref());
        let arrived = dispatcher.dispatch(normalizer.normalize(batch, &*self.store));

        self.stats.record(received, arrived.len());
        debug!(
            "Batch processed: {} received, {} new",
            received,
            arrived.len()
        );
        arrived
    }
}

pub struct Pipeline {
    core: Arc<PipelineCore>,
    driver_factory: Arc<dyn DriverFactory>,
    stop: StopSignal,
    started: AtomicBool,
    driver: Mutex<Option<DriverHandle>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Optional collaborators this pipeline has available
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            toast_renderer: self.core.toast_sink.is_some(),
            socket_transport: self.driver_factory.supports(TransportKind::Socket),
        }
    }

    /// Merge, validate and apply `options`, starting the transport on first use
    ///
    /// Invalid options, or a driver that fails to start, leave the current
    /// state as it was. Only the first successful call starts a driver;
    /// later calls update the configuration used for normalization and
    /// rendering while the transport keeps running with the settings it
    /// started with. Must be called from within a tokio runtime.
    pub fn init(&self, options: &Options) -> AppResult<Arc<Config>> {
        let previous = self.core.config();
        let merged = Config::merge(previous.as_deref(), options);
        ConfigValidator::new(self.capabilities()).validate(options, &merged)?;

        // Published before the driver starts so its first batch sees it
        let config = Arc::new(merged);
        self.core.publish(Some(config.clone()));

        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Pipeline already started, configuration updated");
            return Ok(config);
        }

        if let Err(e) = self.start_driver(&config) {
            self.core.publish(previous);
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(config)
    }

    fn start_driver(&self, config: &Config) -> AppResult<()> {
        tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::internal("Pipeline::init must be called within a tokio runtime"))?;

        let driver = self.driver_factory.create(&config.transport)?;
        info!(
            "Listening for notifications on {} via {}",
            config.transport.endpoint_url()?,
            config.transport.kind
        );

        let core = self.core.clone();
        let handler = transport::blocking_handler(move |batch| {
            core.process_batch(batch);
        });
        let handle = transport::start(driver, handler, self.stop.clone());

        let mut slot = self
            .driver
            .lock()
            .map_err(|_| AppError::internal("driver slot lock poisoned"))?;
        *slot = Some(handle);
        Ok(())
    }

    /// Normalize, deduplicate and dispatch one batch, returning the new items
    pub fn process_batch(&self, batch: RawBatch) -> Vec<Notification> {
        self.core.process_batch(batch)
    }

    /// Effective configuration, if `init` has succeeded
    pub fn config(&self) -> Option<Arc<Config>> {
        self.core.config()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Ask the driver to stop at its next suspension point
    pub fn stop(&self) {
        self.stop.trigger();
    }

    /// Wait for the driver to finish, either stopped or failed
    pub async fn join(&self) -> AppResult<()> {
        let handle = self.driver.lock().ok().and_then(|mut slot| slot.take());
        match handle {
            Some(handle) => handle.join().await,
            None => Ok(()),
        }
    }

    pub async fn shutdown(&self) -> AppResult<()> {
        self.stop();
        self.join().await
    }
}
