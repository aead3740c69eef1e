//! Pipeline orchestrator - wires the demo core, an engine and the dispatcher.
//!
//! The engine loop is blocking, so it runs on a `spawn_blocking` thread and
//! publishes frames into a bounded channel that feeds the dispatcher.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{AcquisitionBlueprint, DriftTable, EngineKind, FrameReady, MdaSequence};
use mda_engine::{DevEngine, DriftCorrectionEngine, RunSummary};
use observability::AcquisitionMetricsAggregator;
use simulator::{DemoCore, DemoCoreConfig, SceneGenerator};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// How long the dispatcher gets to drain sink queues after the run
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The acquisition blueprint
    pub blueprint: AcquisitionBlueprint,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the acquisition to completion.
    ///
    /// When `shutdown` resolves first the run is cancelled cooperatively; the
    /// engine still tears down and the dispatcher still drains.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let sequence = blueprint.to_sequence();
        let drift_table = blueprint.to_drift_table();
        info!(
            uid = %sequence.uid(),
            events = sequence.len(),
            engine = blueprint.engine.kind.as_str(),
            drift_entries = drift_table.len(),
            "Sequence expanded"
        );

        // Dispatcher
        let (frame_tx, frame_rx) = mpsc::channel::<FrameReady>(self.config.buffer_size.max(1));
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - frames will only be counted");
        }
        let active_sinks = blueprint.sinks.len();
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), frame_rx)
            .await
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Demo core publishing into the dispatcher channel
        let aggregator = Arc::new(Mutex::new(AcquisitionMetricsAggregator::new()));
        let mut core = DemoCore::with_config(DemoCoreConfig {
            camera_width: blueprint.simulator.width,
            camera_height: blueprint.simulator.height,
            time_scale: blueprint.engine.time_scale,
            seed: blueprint.simulator.seed,
        });
        core.on_frame_ready(frame_callback(
            frame_tx,
            Arc::clone(&aggregator),
            drift_table.clone(),
        ));
        let cancel = core.cancel_token();

        // Engine on a blocking thread; the core (and with it the last sender)
        // is dropped when the task returns, which closes the dispatcher input.
        let mut run_task =
            tokio::task::spawn_blocking(move || run_engine(core, &blueprint, drift_table, &sequence));

        let joined = tokio::select! {
            joined = &mut run_task => joined,
            _ = shutdown => {
                warn!("Received shutdown signal, cancelling acquisition...");
                cancel.cancel();
                run_task.await
            }
        };
        let run = joined
            .map_err(|e| CliError::engine_task(e.to_string()))?
            .context("Acquisition failed")?;

        info!("Waiting for sinks to drain...");
        let sinks = match tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => return Err(CliError::shutdown(e.to_string()).into()),
            Err(_) => {
                warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "Dispatcher drain timed out");
                Vec::new()
            }
        };

        let acquisition = aggregator
            .lock()
            .map(|aggregator| aggregator.summary())
            .unwrap_or_default();

        let stats = PipelineStats {
            run,
            duration: start_time.elapsed(),
            active_sinks,
            sinks,
            acquisition,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Acquisition complete"
        );

        Ok(stats)
    }
}

/// Build the engine named in the blueprint and run the sequence on it
fn run_engine(
    core: DemoCore,
    blueprint: &AcquisitionBlueprint,
    drift_table: DriftTable,
    sequence: &MdaSequence,
) -> mda_engine::Result<RunSummary> {
    let scene = SceneGenerator::with_config(blueprint.simulator.clone());

    match blueprint.engine.kind {
        EngineKind::Dev => DevEngine::with_generator(core, scene).run(sequence),
        EngineKind::DriftCorrection => {
            let mut engine = DriftCorrectionEngine::with_drift_table(core, drift_table);
            if blueprint.engine.simulate {
                engine.register_image_generator(Some(Box::new(scene)));
            } else {
                info!("Drift engine using the demo camera");
            }
            engine.run(sequence)
        }
    }
}

/// Frame-ready callback: record metrics, then hand the frame to the dispatcher.
///
/// Runs on the engine thread, so `blocking_send` applies backpressure to the
/// acquisition when the dispatcher falls behind.
fn frame_callback(
    tx: mpsc::Sender<FrameReady>,
    aggregator: Arc<Mutex<AcquisitionMetricsAggregator>>,
    drift_table: DriftTable,
) -> contracts::FrameReadyCallback {
    Arc::new(move |frame: FrameReady| {
        observability::record_frame_ready(&frame);
        if let Ok(mut aggregator) = aggregator.lock() {
            aggregator.update(&frame, &drift_table);
        }
        if tx.blocking_send(frame).is_err() {
            warn!("Dispatcher channel closed");
        }
    })
}
