//! Dispatcher - main loop for fan-out to sinks

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{FrameReady, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::stats::SinkReport;
use crate::sinks::{FileSink, FileSinkConfig, LogSink};

/// Per-sink counters collected when the dispatcher shuts down
pub type DispatchReport = Vec<(String, SinkReport)>;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<FrameReady>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<FrameReady>) -> Self {
        Self { config, input_rx }
    }

    /// Build and start the dispatcher
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        Self::check_names(&self.config)?;
        let handles = Self::initialize_handles(&self.config).await?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }

    fn check_names(config: &DispatcherConfig) -> Result<(), DispatcherError> {
        let mut seen = HashSet::new();
        for sink in &config.sinks {
            if !seen.insert(sink.name.as_str()) {
                return Err(DispatcherError::DuplicateSink {
                    name: sink.name.clone(),
                });
            }
        }
        Ok(())
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            handles.push(create_sink_handle(sink_config)?);
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let file_config = FileSinkConfig::from_params(&config.params);
            let path = file_config.base_path.clone();
            let sink = FileSink::new(&config.name, file_config)
                .map_err(|e| DispatcherError::output_dir(&config.name, path, e))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// The main Dispatcher that fans out frames to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<FrameReady>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<FrameReady>) -> Self {
        Self { handles, input_rx }
    }

    /// Number of attached sinks
    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Current counters of every sink
    pub fn report(&self) -> DispatchReport {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.stats().report()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Consumes frames from input and fans out to all sinks.
    /// Returns the final per-sink counters once the input channel is closed
    /// and every worker has drained its queue.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut frame_count: u64 = 0;

        while let Some(frame) = self.input_rx.recv().await {
            frame_count += 1;
            self.dispatch_frame(&frame);

            if frame_count.is_multiple_of(100) {
                debug!(frames = frame_count, "Dispatcher progress");
            }
        }

        info!(
            frames = frame_count,
            "Dispatcher input closed, shutting down"
        );

        let report = Self::shutdown_handles(self.handles).await;

        info!("Dispatcher shutdown complete");
        report
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    fn dispatch_frame(&self, frame: &FrameReady) {
        for handle in &self.handles {
            handle.offer(frame.clone());
        }
    }

    async fn shutdown_handles(handles: Vec<SinkHandle>) -> DispatchReport {
        let mut report = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = handle.name().to_string();
            let stats = std::sync::Arc::clone(handle.stats());
            handle.shutdown().await;
            report.push((name, stats.report()));
        }
        report
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<FrameReady>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}
