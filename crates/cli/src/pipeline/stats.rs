//! Acquisition statistics.

use std::time::Duration;

use dispatcher::DispatchReport;
use mda_engine::RunSummary;
use observability::MetricsSummary;

/// Statistics from one acquisition run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Engine-side counters
    pub run: RunSummary,

    /// Total duration of the run, including sink drain
    pub duration: Duration,

    /// Number of configured sinks
    pub active_sinks: usize,

    /// Per-sink counters: written, failed, dropped, bytes, frames per position
    pub sinks: DispatchReport,

    /// Frame-level aggregate (drift magnitude, intensity, per-position counts)
    pub acquisition: MetricsSummary,
}

impl PipelineStats {
    /// Frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.run.frames_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Frames dropped across all sinks because a queue was full
    pub fn frames_dropped(&self) -> u64 {
        self.sinks.iter().map(|(_, sink)| sink.dropped).sum()
    }

    /// Pixel bytes persisted across all sinks
    pub fn bytes_written(&self) -> u64 {
        self.sinks.iter().map(|(_, sink)| sink.bytes_written).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Acquisition Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Outcome: {}", self.run.outcome());
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events processed: {}", self.run.events_processed);
        println!("   ├─ Frames emitted: {}", self.run.frames_emitted);
        println!("   ├─ Scene steps: {}", self.run.scene_steps);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   └─ Active sinks: {}", self.active_sinks);

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, sink)) in self.sinks.iter().enumerate() {
                let last = i == self.sinks.len() - 1;
                let (prefix, indent) = if last { ("└─", " ") } else { ("├─", "│") };
                println!(
                    "   {} {}: written={}, failed={}, dropped={}, {:.1} KiB",
                    prefix,
                    name,
                    sink.written,
                    sink.failed,
                    sink.dropped,
                    sink.bytes_written as f64 / 1024.0
                );
                let positions: Vec<String> = sink
                    .written_per_position
                    .iter()
                    .map(|(position, frames)| match *position {
                        contracts::NO_POSITION => format!("-:{frames}"),
                        position => format!("p{position}:{frames}"),
                    })
                    .collect();
                if !positions.is_empty() {
                    println!("   {}    positions {}", indent, positions.join(" "));
                }
            }
        }

        println!("\n{}", self.acquisition);
    }
}
