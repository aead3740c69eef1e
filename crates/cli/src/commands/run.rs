//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::pipeline::{Pipeline, PipelineConfig};
use contracts::{AcquisitionBlueprint, EngineKind};

/// Execute the `run` command
pub async fn run_acquisition(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after command-line overrides")?;

    info!(
        engine = blueprint.engine.kind.as_str(),
        simulate = blueprint.engine.simulate,
        time_scale = blueprint.engine.time_scale,
        positions = blueprint.sequence.stage_positions.len(),
        channels = blueprint.sequence.channels.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        buffer_size: args.buffer_size,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!("Starting acquisition...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Acquisition failed")?;

    info!(
        frames = stats.run.frames_emitted,
        dropped = stats.frames_dropped(),
        bytes = stats.bytes_written(),
        cancelled = stats.run.cancelled,
        duration_secs = stats.duration.as_secs_f64(),
        "Acquisition finished"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command-line overrides on top of the loaded blueprint
fn apply_overrides(blueprint: &mut AcquisitionBlueprint, args: &RunArgs) {
    if let Some(engine) = args.engine {
        info!(engine = ?engine, "Overriding engine from CLI");
        blueprint.engine.kind = engine.into();
    }
    if args.no_simulator {
        if blueprint.engine.kind != EngineKind::DriftCorrection {
            warn!("--no-simulator only affects the drift engine");
        }
        blueprint.engine.simulate = false;
    }
    if let Some(time_scale) = args.time_scale {
        info!(time_scale, "Overriding time scale from CLI");
        blueprint.engine.time_scale = time_scale;
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &AcquisitionBlueprint) {
    let sequence = blueprint.to_sequence();

    println!("\n=== Configuration Summary ===\n");
    println!("Engine:");
    println!("  Kind: {}", blueprint.engine.kind.as_str());
    println!("  Simulate: {}", blueprint.engine.simulate);
    println!("  Time scale: {}", blueprint.engine.time_scale);

    println!("\nSequence ({} events):", sequence.len());
    for (axis, size) in blueprint.sequence.shape() {
        println!("  - {}: {}", axis.label(), size);
    }

    let drift = blueprint.to_drift_table();
    if !drift.is_empty() {
        println!("\nDrift table ({}):", drift.len());
        for (position, offset) in drift.iter() {
            println!("  - p{}: dx={:.3}, dy={:.3}", position, offset.x, offset.y);
        }
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
