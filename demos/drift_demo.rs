//! Drift Correction Demo
//!
//! Runs a small time-lapse over three stage positions with the drift engine
//! against the demo core and scene generator. Between time points the drift
//! table is grown from the scene's own centroid motion, so later frames are
//! re-centred on the particles that wandered off.
//!
//! A real setup would estimate the shift from image registration; the
//! simulated scene lets the demo read it directly.
//!
//! Run with: cargo run -p mda_demos --bin drift_demo [config.toml]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{
    AcquisitionBlueprint, ContractError, DriftVector, FrameReady, Image, ImageGenerator,
    MdaSequence, SinkConfig, SinkType, SnapParams, StagePoint, TimePlan, NO_POSITION,
};
use mda_engine::DriftCorrectionEngine;
use observability::{AcquisitionMetricsAggregator, LogFormat, Verbosity};
use simulator::{DemoCore, DemoCoreConfig, SceneGenerator};
use tokio::sync::mpsc;

const DEMO_CONFIG: &str = r#"
[sequence]
axis_order = "tpc"

[sequence.time_plan]
interval_s = 1.0
loops = 1

[[sequence.stage_positions]]
name = "left"
x = -300.0
y = 0.0

[[sequence.stage_positions]]
name = "centre"
x = 0.0
y = 0.0

[[sequence.stage_positions]]
name = "right"
x = 300.0
y = 0.0

[[sequence.channels]]
config = "DAPI"
exposure_ms = 20.0

[engine]
kind = "drift_correction"
time_scale = 0.0

[simulator]
n_particles = 800
width = 128
height = 128
step_sigma = 4.0
seed = 7

[[sinks]]
name = "log"
sink_type = "log"
"#;

/// Time points acquired one sequence at a time so drift can be updated in between
const TIME_POINTS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_tracing(LogFormat::Compact, Verbosity::Normal)?;

    tracing::info!("Starting drift correction demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading acquisition config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        ConfigLoader::load_from_str(DEMO_CONFIG, ConfigFormat::Toml)?
    };

    // ==== Stage 2: Dispatcher ====
    let (frame_tx, frame_rx) = mpsc::channel::<FrameReady>(64);
    let sinks = if blueprint.sinks.is_empty() {
        vec![log_sink()]
    } else {
        blueprint.sinks.clone()
    };
    let dispatcher = dispatcher::create_dispatcher(sinks, frame_rx).await?.spawn();

    // ==== Stage 3: Run time points on a blocking thread ====
    let aggregator = Arc::new(Mutex::new(AcquisitionMetricsAggregator::new()));
    let worker_aggregator = Arc::clone(&aggregator);
    let final_drift = tokio::task::spawn_blocking(move || {
        run_time_points(&blueprint, frame_tx, worker_aggregator)
    })
    .await?
    .map_err(|e| e as Box<dyn std::error::Error>)?;

    // ==== Stage 4: Drain and report ====
    let report = dispatcher.await?;
    for (name, metrics) in report {
        tracing::info!(
            sink = %name,
            written = metrics.written,
            dropped = metrics.dropped,
            bytes = metrics.bytes_written,
            "Sink finished"
        );
    }

    println!("\nFinal drift table:");
    for (position, offset) in final_drift {
        println!("  p{position}: dx={:.2}, dy={:.2}", offset.x, offset.y);
    }
    if let Ok(aggregator) = aggregator.lock() {
        println!("\n{}", aggregator.summary());
    }

    Ok(())
}

fn log_sink() -> SinkConfig {
    SinkConfig {
        name: "log".to_string(),
        sink_type: SinkType::Log,
        queue_capacity: 100,
        params: HashMap::new(),
    }
}

/// Scene shared between the engine (rendering) and the demo (stepping, centroid)
struct SharedScene(Arc<Mutex<SceneGenerator>>);

impl ImageGenerator for SharedScene {
    fn step_positions(&mut self) {
        if let Ok(mut scene) = self.0.lock() {
            scene.step_positions();
        }
    }

    fn snap_img(&mut self, position: StagePoint, params: SnapParams) -> Result<Image, ContractError> {
        self.0
            .lock()
            .map_err(|_| ContractError::generator("scene lock poisoned"))?
            .snap_img(position, params)
    }

    fn snap_rgb(&mut self, position: StagePoint) -> Result<Image, ContractError> {
        self.0
            .lock()
            .map_err(|_| ContractError::generator("scene lock poisoned"))?
            .snap_rgb(position)
    }
}

/// Acquire `TIME_POINTS` single-time-point sequences. Before each one the
/// scene is stepped and its centroid motion accumulated into the drift table
/// for every position.
fn run_time_points(
    blueprint: &AcquisitionBlueprint,
    frame_tx: mpsc::Sender<FrameReady>,
    aggregator: Arc<Mutex<AcquisitionMetricsAggregator>>,
) -> Result<Vec<(i64, DriftVector)>, Box<dyn std::error::Error + Send + Sync>> {
    let scene = Arc::new(Mutex::new(SceneGenerator::with_config(
        blueprint.simulator.clone(),
    )));
    let drift_in_effect = Arc::new(Mutex::new(blueprint.to_drift_table()));

    let mut core = DemoCore::with_config(DemoCoreConfig {
        camera_width: blueprint.simulator.width,
        camera_height: blueprint.simulator.height,
        time_scale: 0.0,
        seed: blueprint.simulator.seed,
    });
    let drift = Arc::clone(&drift_in_effect);
    core.on_frame_ready(Arc::new(move |frame: FrameReady| {
        if let (Ok(mut aggregator), Ok(drift)) = (aggregator.lock(), drift.lock()) {
            aggregator.update(&frame, &drift);
        }
        // a closed dispatcher only means the demo is shutting down
        let _ = frame_tx.blocking_send(frame);
    }));

    let mut engine = DriftCorrectionEngine::with_drift_table(core, blueprint.to_drift_table());
    engine.register_image_generator(Some(Box::new(SharedScene(Arc::clone(&scene)))));

    let mut plan = blueprint.sequence.clone();
    plan.time_plan = Some(TimePlan {
        interval_s: 0.0,
        loops: 1,
    });
    let positions: Vec<i64> = if plan.stage_positions.is_empty() {
        vec![NO_POSITION]
    } else {
        (0..plan.stage_positions.len() as i64).collect()
    };

    for t in 0..TIME_POINTS {
        if t > 0 {
            let mut scene = scene.lock().map_err(|_| "scene lock poisoned")?;
            let before = scene.centroid();
            scene.step_positions();
            let after = scene.centroid();
            // particles moved by (after - before); follow them
            let step = DriftVector::new(before.0 - after.0, before.1 - after.1);
            for &position in &positions {
                engine.drift_table_mut().accumulate(position, step);
            }
        }
        if let Ok(mut drift) = drift_in_effect.lock() {
            *drift = engine.drift_table().clone();
        }

        let summary = engine.run(&MdaSequence::from_plan(plan.clone()))?;
        tracing::info!(t, %summary, "Time point acquired");
    }

    Ok(engine.drift_table().iter().collect())
}
