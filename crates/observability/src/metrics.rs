//! 采集指标收集模块
//!
//! 引擎与 sink 直接通过 `metrics` 宏上报计数；这里提供描述信息、
//! 帧级别的辅助上报函数，以及用于运行摘要的内存聚合器。

use std::collections::BTreeMap;

use contracts::{DriftTable, FrameReady, NO_POSITION};
use metrics::{Unit, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 注册所有指标的描述信息
///
/// 在安装 Prometheus recorder 之后调用一次。
pub fn describe_metrics() {
    describe_counter!("mda_runs_total", "Completed engine runs by outcome");
    describe_counter!("mda_frames_total", Unit::Count, "Frames emitted by an engine");
    describe_counter!(
        "mda_scene_steps_total",
        Unit::Count,
        "Brownian steps applied to the simulated scene"
    );
    describe_histogram!(
        "mda_drift_correction_um",
        "Per-axis drift offset subtracted from stage targets"
    );
    describe_counter!(
        "mda_frames_dispatched_total",
        Unit::Count,
        "Frames handed to a sink, by status"
    );
    describe_counter!(
        "mda_sink_bytes_total",
        Unit::Bytes,
        "Pixel bytes written by each sink"
    );
    describe_histogram!("mda_frame_mean_intensity", "Mean pixel value of emitted frames");
    describe_gauge!("mda_last_frame_number", "Frame number of the latest emitted frame");
}

/// 记录一帧的图像统计
pub fn record_frame_ready(frame: &FrameReady) {
    histogram!("mda_frame_mean_intensity").record(frame.image.mean());
    gauge!("mda_last_frame_number").set(frame.frame_number as f64);
}

/// 采集指标聚合器
///
/// 在内存中聚合指标，便于运行结束后输出摘要。
#[derive(Debug, Clone, Default)]
pub struct AcquisitionMetricsAggregator {
    /// 总帧数
    pub total_frames: u64,

    /// 施加了非零漂移校正的帧数
    pub corrected_frames: u64,

    /// 漂移校正幅度统计 (um)
    pub drift_stats: RunningStats,

    /// 帧平均强度统计
    pub intensity_stats: RunningStats,

    /// 各位置帧数 (NO_POSITION 表示无位置维度)
    pub frames_per_position: BTreeMap<i64, u64>,
}

impl AcquisitionMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    ///
    /// `drift` 为本次运行使用的漂移表；非漂移引擎传入空表即可。
    pub fn update(&mut self, frame: &FrameReady, drift: &DriftTable) {
        self.total_frames += 1;

        let position = frame.event.index.position_key();
        *self.frames_per_position.entry(position).or_insert(0) += 1;

        let offset = drift.offset(position);
        if !offset.is_zero() {
            self.corrected_frames += 1;
        }
        self.drift_stats.push(offset.magnitude());
        self.intensity_stats.push(frame.image.mean());
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            corrected_frames: self.corrected_frames,
            corrected_rate: if self.total_frames > 0 {
                self.corrected_frames as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            drift_um: StatsSummary::from(&self.drift_stats),
            mean_intensity: StatsSummary::from(&self.intensity_stats),
            frames_per_position: self.frames_per_position.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub corrected_frames: u64,
    /// 百分比
    pub corrected_rate: f64,
    pub drift_um: StatsSummary,
    pub mean_intensity: StatsSummary,
    pub frames_per_position: BTreeMap<i64, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Acquisition Metrics Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(
            f,
            "Drift-corrected frames: {} ({:.2}%)",
            self.corrected_frames, self.corrected_rate
        )?;
        writeln!(f, "Drift magnitude (um): {}", self.drift_um)?;
        writeln!(f, "Mean intensity: {}", self.mean_intensity)?;

        if !self.frames_per_position.is_empty() {
            writeln!(f, "Frames per position:")?;
            for (position, count) in &self.frames_per_position {
                if *position == NO_POSITION {
                    writeln!(f, "  -: {count}")?;
                } else {
                    writeln!(f, "  p{position}: {count}")?;
                }
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
