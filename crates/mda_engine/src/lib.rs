//! # MDA Engine
//!
//! 多维采集 (MDA) 引擎，替代主机引擎的运行循环。
//!
//! 负责：
//! - `DevEngine`: 用图像生成器的模拟图像代替相机帧
//! - `DriftCorrectionEngine`: 移动硬件前按位置应用漂移表
//!
//! 主机能力 (等待/取消、硬件准备、相机、帧通知、收尾) 通过
//! `contracts::AcquisitionHost` 注入。
//!
//! ## 使用示例
//!
//! ```ignore
//! use mda_engine::DriftCorrectionEngine;
//! use simulator::DemoCore;
//!
//! let mut engine = DriftCorrectionEngine::new(DemoCore::new());
//! engine.drift_table_mut().set(0, DriftVector::new(1.5, -0.5));
//! let summary = engine.run(&sequence)?;
//! ```

mod cursor;
mod dev;
mod drift;
mod error;
mod phase;
mod runner;

#[cfg(test)]
mod testing;

pub use cursor::SimulatedTimeCursor;
pub use dev::{DevEngine, DEFAULT_PARTICLES};
pub use drift::DriftCorrectionEngine;
pub use error::{EngineError, Result};
pub use phase::{RunPhase, RunSummary};
