//! Shared run loop
//!
//! Both engines walk the sequence the same way and differ only in how a
//! single event is prepared and captured. Teardown runs on every exit path.

use contracts::{AcquisitionHost, Image, MdaEvent, MdaSequence};
use tracing::{debug, info, warn};

use crate::{EngineError, Result, RunPhase, RunSummary};

pub(crate) fn enter(engine: &'static str, phase: RunPhase) {
    debug!(engine, phase = %phase, "run phase");
}

/// Host pre-run setup
pub(crate) fn prepare<H: AcquisitionHost>(
    host: &mut H,
    sequence: &MdaSequence,
    engine: &'static str,
) -> Result<()> {
    enter(engine, RunPhase::Preparing);
    host.prepare_to_run(sequence)
        .map_err(|e| EngineError::host(RunPhase::Preparing, e))
}

/// Walk the sequence, calling `acquire` for every event that is not
/// cancelled, then tear down.
///
/// If both the loop and the teardown fail, the loop error is returned.
pub(crate) fn run_events<H, F>(
    host: &mut H,
    sequence: &MdaSequence,
    engine: &'static str,
    mut acquire: F,
) -> Result<RunSummary>
where
    H: AcquisitionHost,
    F: FnMut(&mut H, MdaEvent, &mut RunSummary) -> Result<()>,
{
    let mut summary = RunSummary::default();
    let looped = event_loop(host, sequence, engine, &mut summary, &mut acquire);

    enter(engine, RunPhase::Finishing);
    let teardown = host
        .finish_run(sequence)
        .map_err(|e| EngineError::host(RunPhase::Finishing, e));
    enter(engine, RunPhase::Idle);

    let result = match (looped, teardown) {
        (Ok(()), Ok(())) => Ok(summary),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(e), Err(teardown_error)) => {
            warn!(engine, error = %teardown_error, "teardown failed after run error");
            Err(e)
        }
    };

    let outcome = match &result {
        Ok(summary) => summary.outcome(),
        Err(_) => "failed",
    };
    metrics::counter!("mda_runs_total", "engine" => engine, "outcome" => outcome).increment(1);

    match &result {
        Ok(summary) => info!(engine, %summary, "run finished"),
        Err(e) => warn!(engine, error = %e, "run failed"),
    }
    result
}

fn event_loop<H, F>(
    host: &mut H,
    sequence: &MdaSequence,
    engine: &'static str,
    summary: &mut RunSummary,
    acquire: &mut F,
) -> Result<()>
where
    H: AcquisitionHost,
    F: FnMut(&mut H, MdaEvent, &mut RunSummary) -> Result<()>,
{
    for event in sequence.iter() {
        enter(engine, RunPhase::EventWait);
        if host.wait_until_event(&event, sequence) {
            enter(engine, RunPhase::Cancelled);
            info!(engine, index = %event.index, "run cancelled");
            summary.cancelled = true;
            break;
        }

        info!(engine, index = %event.index, "{event}");
        summary.events_processed += 1;
        acquire(host, event, summary)?;
    }
    Ok(())
}

/// Publish a frame through the host
pub(crate) fn emit<H: AcquisitionHost>(
    host: &mut H,
    image: Image,
    event: &MdaEvent,
    engine: &'static str,
    summary: &mut RunSummary,
) {
    enter(engine, RunPhase::Emit);
    host.frame_ready(image, event);
    summary.frames_emitted += 1;
    metrics::counter!("mda_frames_total", "engine" => engine).increment(1);
}
