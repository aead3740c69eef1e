//! AcquisitionBlueprint - Config Loader 输出
//!
//! 描述完整的采集配置：序列计划、引擎、模拟器、漂移表、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{DriftEntry, DriftTable, MdaSequence, SequencePlan};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 采集序列计划
    pub sequence: SequencePlan,

    /// 引擎选择
    #[serde(default)]
    pub engine: EngineConfig,

    /// 模拟场景参数
    #[serde(default)]
    pub simulator: SceneConfig,

    /// 初始漂移表
    #[serde(default)]
    pub drift: Vec<DriftEntry>,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// 模拟采集 (生成器代替相机)
    #[default]
    Dev,
    /// 漂移校正
    DriftCorrection,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Dev => "dev",
            EngineKind::DriftCorrection => "drift_correction",
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,

    /// Drift engine only: register the scene generator instead of the camera
    #[serde(default = "default_simulate")]
    pub simulate: bool,

    /// Wall-clock pacing factor for `min_start_time` (0 = no waiting)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            simulate: default_simulate(),
            time_scale: default_time_scale(),
        }
    }
}

fn default_simulate() -> bool {
    true
}

fn default_time_scale() -> f64 {
    1.0
}

/// 模拟场景配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// 粒子数量
    #[serde(default = "default_n_particles")]
    pub n_particles: usize,

    /// 图像宽度 (像素)
    #[serde(default = "default_image_size")]
    pub width: u32,

    /// 图像高度 (像素)
    #[serde(default = "default_image_size")]
    pub height: u32,

    /// 场景边长 (stage units)，粒子分布在 [-field_size/2, field_size/2]
    #[serde(default = "default_field_size")]
    pub field_size: f64,

    /// 每步布朗运动标准差 (stage units)
    #[serde(default = "default_step_sigma")]
    pub step_sigma: f64,

    /// 随机种子 (None = 随机)
    #[serde(default)]
    pub seed: Option<u64>,

    /// 荧光通道数
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// 光斑高斯半径 (像素)
    #[serde(default = "default_spot_sigma")]
    pub spot_sigma_px: f64,

    /// 背景灰度
    #[serde(default = "default_background")]
    pub background: u16,

    /// 焦深，离焦距离按此衰减亮度
    #[serde(default = "default_focal_depth")]
    pub focal_depth: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            n_particles: default_n_particles(),
            width: default_image_size(),
            height: default_image_size(),
            field_size: default_field_size(),
            step_sigma: default_step_sigma(),
            seed: None,
            channels: default_channels(),
            spot_sigma_px: default_spot_sigma(),
            background: default_background(),
            focal_depth: default_focal_depth(),
        }
    }
}

fn default_n_particles() -> usize {
    5000
}

fn default_image_size() -> u32 {
    512
}

fn default_field_size() -> f64 {
    2048.0
}

fn default_step_sigma() -> f64 {
    1.5
}

fn default_channels() -> usize {
    3
}

fn default_spot_sigma() -> f64 {
    1.5
}

fn default_background() -> u16 {
    100
}

fn default_focal_depth() -> f64 {
    5.0
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出 (PNG + JSON)
    File,
}

impl AcquisitionBlueprint {
    /// Expand the sequence plan into a runnable sequence
    pub fn to_sequence(&self) -> MdaSequence {
        MdaSequence::from_plan(self.sequence.clone())
    }

    /// Initial drift table
    pub fn to_drift_table(&self) -> DriftTable {
        self.drift.iter().copied().collect()
    }
}
