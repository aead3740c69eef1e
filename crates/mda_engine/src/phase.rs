//! Run state machine and run summary

use std::fmt;

/// Engine run phase
///
/// `Idle -> Preparing -> (EventWait -> [Cancelled | Prepare -> Capture -> Emit])* -> Finishing -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    /// Pre-run setup
    Preparing,
    /// Waiting for the event's start time
    EventWait,
    /// Cancel observed while waiting
    Cancelled,
    /// Hardware prep
    Prepare,
    /// Image acquisition
    Capture,
    /// Frame-ready publication
    Emit,
    /// Teardown
    Finishing,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Preparing => "preparing",
            RunPhase::EventWait => "event_wait",
            RunPhase::Cancelled => "cancelled",
            RunPhase::Prepare => "prepare",
            RunPhase::Capture => "capture",
            RunPhase::Emit => "emit",
            RunPhase::Finishing => "finishing",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events that passed the wait (hardware was prepared)
    pub events_processed: usize,
    /// Frame-ready notifications emitted
    pub frames_emitted: usize,
    /// Scene steps triggered by new time indices
    pub scene_steps: usize,
    /// Run stopped by cancellation
    pub cancelled: bool,
}

impl RunSummary {
    pub fn outcome(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else {
            "completed"
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events, {} frames, {} scene steps ({})",
            self.events_processed,
            self.frames_emitted,
            self.scene_steps,
            self.outcome()
        )
    }
}
