//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{AcquisitionBlueprint, MdaEvent};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    engine: EngineInfo,
    sequence: SequenceInfo,
    simulator: SimulatorInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    drift: Vec<DriftInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<MdaEvent>>,
}

#[derive(Serialize)]
struct EngineInfo {
    kind: String,
    simulate: bool,
    time_scale: f64,
}

#[derive(Serialize)]
struct SequenceInfo {
    axis_order: String,
    /// (axis label, size) in nesting order
    shape: Vec<(char, usize)>,
    event_count: usize,
}

#[derive(Serialize)]
struct SimulatorInfo {
    n_particles: usize,
    width: u32,
    height: u32,
    channels: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct DriftInfo {
    position: i64,
    dx: f64,
    dy: f64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &AcquisitionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sequence = blueprint.to_sequence();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        engine: EngineInfo {
            kind: blueprint.engine.kind.as_str().to_string(),
            simulate: blueprint.engine.simulate,
            time_scale: blueprint.engine.time_scale,
        },
        sequence: SequenceInfo {
            axis_order: blueprint.sequence.axis_order.to_string(),
            shape: blueprint
                .sequence
                .shape()
                .into_iter()
                .map(|(axis, size)| (axis.label(), size))
                .collect(),
            event_count: sequence.len(),
        },
        simulator: SimulatorInfo {
            n_particles: blueprint.simulator.n_particles,
            width: blueprint.simulator.width,
            height: blueprint.simulator.height,
            channels: blueprint.simulator.channels,
            seed: blueprint.simulator.seed,
        },
        drift: blueprint
            .to_drift_table()
            .iter()
            .map(|(position, offset)| DriftInfo {
                position,
                dx: offset.x,
                dy: offset.y,
            })
            .collect(),
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect(),
        events: args.events.then(|| sequence.events().to_vec()),
    }
}

fn print_config_info(blueprint: &AcquisitionBlueprint, args: &InfoArgs) {
    let sequence = blueprint.to_sequence();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               MDA Acquisition Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Engine");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Kind: {}", blueprint.engine.kind.as_str());
    println!("   ├─ Simulate: {}", blueprint.engine.simulate);
    println!("   └─ Time scale: {}", blueprint.engine.time_scale);

    let shape = blueprint.sequence.shape();
    println!("\n🔬 Sequence ({} events)", sequence.len());
    println!("   ├─ Axis order: {}", blueprint.sequence.axis_order);
    for (i, (axis, size)) in shape.iter().enumerate() {
        let prefix = if i == shape.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}: {}", prefix, axis.label(), size);
    }
    if shape.is_empty() {
        println!("   └─ (single event)");
    }

    let sim = &blueprint.simulator;
    println!("\n✨ Simulator");
    println!("   ├─ Particles: {}", sim.n_particles);
    println!("   ├─ Image: {}x{}", sim.width, sim.height);
    println!("   └─ Channels: {}", sim.channels);

    let drift = blueprint.to_drift_table();
    if !drift.is_empty() {
        println!("\n📐 Drift table ({})", drift.len());
        for (i, (position, offset)) in drift.iter().enumerate() {
            let prefix = if i == drift.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} p{}: dx={:.3}, dy={:.3}",
                prefix, position, offset.x, offset.y
            );
        }
    }

    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
        }
    }

    if args.events {
        println!("\n📋 Events");
        for event in sequence.iter() {
            println!("   {}", event);
        }
    }

    println!();
}
