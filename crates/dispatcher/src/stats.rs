//! Per-sink acquisition statistics
//!
//! 每个 sink 独立统计：写入/失败/丢弃帧数、像素字节数、按位置的写入帧数。
//! 同时把计数导出为 `mda_frames_dispatched_total` / `mda_sink_bytes_total`。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use contracts::FrameReady;

/// Outcome of handing one frame to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Written,
    Failed,
    Dropped,
}

impl FrameOutcome {
    fn label(self) -> &'static str {
        match self {
            FrameOutcome::Written => "ok",
            FrameOutcome::Failed => "error",
            FrameOutcome::Dropped => "dropped",
        }
    }
}

/// Live counters for one sink, shared between its handle and worker
#[derive(Debug)]
pub struct SinkStats {
    sink: String,
    queue_depth: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    bytes_written: AtomicU64,
    written_per_position: Mutex<BTreeMap<i64, u64>>,
}

impl SinkStats {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            queue_depth: AtomicUsize::new(0),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            written_per_position: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    /// Count a frame against this sink
    pub fn record(&self, frame: &FrameReady, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Written => {
                self.written.fetch_add(1, Ordering::Relaxed);
                let bytes = frame.image.data.len() as u64;
                self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
                metrics::counter!("mda_sink_bytes_total", "sink" => self.sink.clone())
                    .increment(bytes);
                if let Ok(mut positions) = self.written_per_position.lock() {
                    *positions
                        .entry(frame.event.index.position_key())
                        .or_default() += 1;
                }
            }
            FrameOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            FrameOutcome::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        metrics::counter!(
            "mda_frames_dispatched_total",
            "sink" => self.sink.clone(),
            "status" => outcome.label()
        )
        .increment(1);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> SinkReport {
        SinkReport {
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            written: self.written(),
            failed: self.failed(),
            dropped: self.dropped(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            written_per_position: self
                .written_per_position
                .lock()
                .map(|positions| positions.clone())
                .unwrap_or_default(),
        }
    }
}

/// Point-in-time copy of a sink's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub queue_depth: usize,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
    /// Pixel payload bytes of written frames
    pub bytes_written: u64,
    /// Written frames keyed by position (-1 = no position axis)
    pub written_per_position: BTreeMap<i64, u64>,
}

impl SinkReport {
    /// Frames offered to the sink
    pub fn offered(&self) -> u64 {
        self.written + self.failed + self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frame;
    use contracts::{Axis, EventIndex};

    #[test]
    fn test_written_frames_counted_per_position() {
        let stats = SinkStats::new("disk");
        let mut frame = test_frame(0);
        stats.record(&frame, FrameOutcome::Written);
        frame.event.index = EventIndex::new().with(Axis::Position, 3);
        stats.record(&frame, FrameOutcome::Written);
        stats.record(&frame, FrameOutcome::Written);

        let report = stats.report();
        assert_eq!(report.written, 3);
        // 2x2 mono16
        assert_eq!(report.bytes_written, 3 * 8);
        assert_eq!(report.written_per_position, BTreeMap::from([(-1, 1), (3, 2)]));
    }

    #[test]
    fn test_failed_and_dropped_not_in_positions() {
        let stats = SinkStats::new("slow");
        let frame = test_frame(0);
        stats.record(&frame, FrameOutcome::Failed);
        stats.record(&frame, FrameOutcome::Dropped);
        stats.record(&frame, FrameOutcome::Dropped);

        let report = stats.report();
        assert_eq!((report.failed, report.dropped), (1, 2));
        assert_eq!(report.offered(), 3);
        assert_eq!(report.bytes_written, 0);
        assert!(report.written_per_position.is_empty());
    }
}
