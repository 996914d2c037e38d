//! Listening for notifications and checking the configuration

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use trumpet::config::{Capabilities, Config, ConfigValidator, Options, TransportKind};
use trumpet::outbound;
use trumpet::render::{NtfyToastSink, TerminalSink, WebhookCallback};
use trumpet::retry::RetryConfig;
use trumpet::store::FileStore;
use trumpet::transport::{DefaultDriverFactory, DriverFactory};
use trumpet::Pipeline;

use super::super::{CliContext, ListenArgs};

const DELIVERY_TIMEOUT_SECS: u64 = 30;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ListenHandler<'a> {
    context: &'a CliContext,
}

impl<'a> ListenHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// File options with command-line flags on top
    fn options(&self, args: &ListenArgs) -> Options {
        self.context.file().options.clone().overlay(args.to_options())
    }

    /// Run a pipeline until Ctrl-C or a fatal transport error
    pub async fn handle_listen(&self, args: ListenArgs) -> Result<()> {
        let file = self.context.file();
        let options = self.options(&args);
        let preview = Config::merge(None, &options);

        let store_path = match &args.store {
            Some(path) => path.clone(),
            None => self.context.config_manager.store_path()?,
        };
        let store = FileStore::open(&store_path);

        let timeout = Duration::from_secs(preview.toast.timeout_secs.unwrap_or(DELIVERY_TIMEOUT_SECS));
        let (queue, worker) = outbound::channel(RetryConfig::default(), timeout)?;
        let worker_task = tokio::spawn(worker.run());

        let terminal = TerminalSink::new(
            file.terminal.template.as_deref(),
            preview.position,
            file.terminal.width,
        )?;
        let mut builder = Pipeline::builder().store(store).render_sink(terminal);
        if options.toast.is_some() {
            builder = builder.toast_sink(NtfyToastSink::new(&preview.toast, queue.clone()));
        }
        if let Some(url) = &preview.callback_url {
            builder = builder.callback(WebhookCallback::new(url, queue.clone()));
        }
        drop(queue);
        let pipeline = builder.build();

        pipeline.init(&options)?;

        let stop = pipeline.stop_signal();
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, stopping");
            stop.trigger();
        })
        .context("Failed to install Ctrl+C handler")?;

        let result = pipeline.join().await;
        let stats = pipeline.stats();
        info!(
            "Stopped after {} batches: {} notifications shown, {} duplicates skipped",
            stats.batches, stats.dispatched, stats.duplicates
        );

        // Dropping the pipeline releases the last queue handles held by its sinks
        drop(pipeline);
        if tokio::time::timeout(DRAIN_TIMEOUT, worker_task).await.is_err() {
            warn!("Pending deliveries were dropped on shutdown");
        }

        result.map_err(Into::into)
    }

    /// Report every configuration problem without starting anything
    pub fn handle_check(&self, args: &ListenArgs) -> Result<()> {
        let options = self.options(args);
        let config = Config::merge(None, &options);
        let capabilities = Capabilities {
            toast_renderer: options.toast.is_some(),
            socket_transport: DefaultDriverFactory.supports(TransportKind::Socket),
        };

        let issues = ConfigValidator::new(capabilities).check(&options, &config);
        if !issues.is_empty() {
            for issue in &issues {
                println!("✗ {issue}");
            }
            bail!("{} configuration problem(s) found", issues.len());
        }

        println!("✓ Configuration is valid");
        println!("  transport: {}", config.transport.kind);
        println!("  endpoint:  {}", config.transport.endpoint_url()?);
        if config.transport.kind == TransportKind::HttpPoll {
            println!("  interval:  {} ms", config.transport.poll_interval.as_millis());
        }
        println!(
            "  renderer:  {}",
            if config.use_toast { "ntfy toast" } else { "terminal" }
        );
        if let Some(url) = &config.callback_url {
            println!("  callback:  {url}");
        }
        Ok(())
    }
}
