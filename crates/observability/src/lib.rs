//! # Observability
//!
//! 可观测性模块：Tracing 订阅器、Prometheus 指标导出、采集帧统计。
//!
//! 二进制 (CLI、demo) 只调用这里的初始化函数，不直接搭建订阅器。
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{AcquisitionMetricsAggregator, LogFormat, Verbosity};
//!
//! observability::init_tracing(LogFormat::Compact, Verbosity::from_flags(false, 1))?;
//! observability::init_metrics_only(9000)?;
//!
//! let mut aggregator = AcquisitionMetricsAggregator::new();
//! core.on_frame_ready(Arc::new(move |frame| {
//!     observability::record_frame_ready(&frame);
//!     aggregator.update(&frame, &drift_table);
//! }));
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    describe_metrics, record_frame_ready, AcquisitionMetricsAggregator, MetricsSummary,
    RunningStats, StatsSummary,
};

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志 (线程、文件、行号)
    Json,
    /// 多行可读格式
    #[default]
    Pretty,
    /// 单行紧凑格式
    Compact,
}

/// 日志详细程度
///
/// `Quiet` 固定为 warn，忽略 `RUST_LOG`；其余级别在未设置 `RUST_LOG` 时生效。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Debug,
    Trace,
}

impl Verbosity {
    /// From `-q` / repeated `-v` flags
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, 0) => Verbosity::Normal,
            (false, 1) => Verbosity::Debug,
            (false, _) => Verbosity::Trace,
        }
    }

    pub fn level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }

    fn filter(self) -> EnvFilter {
        if self == Verbosity::Quiet {
            return EnvFilter::new(self.level());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level()))
    }
}

/// 完整初始化配置
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    pub verbosity: Verbosity,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
}

/// 初始化 Tracing，并在配置了端口时安装 Prometheus 导出器
pub fn init_with_config(config: &ObservabilityConfig) -> Result<()> {
    init_tracing(config.log_format, config.verbosity)?;
    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }
    tracing::info!(
        log_format = ?config.log_format,
        level = config.verbosity.level(),
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// 仅初始化 Tracing 订阅器
pub fn init_tracing(format: LogFormat, verbosity: Verbosity) -> Result<()> {
    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(verbosity.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

/// 仅初始化 Prometheus 指标 (Tracing 已初始化时使用)
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;
    describe_metrics();

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
