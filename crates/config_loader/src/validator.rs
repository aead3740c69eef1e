//! 配置校验模块
//!
//! 校验规则：
//! - 曝光时间 > 0 (每个通道，或 default_exposure_ms)
//! - time_plan: 0 <= interval_s <= 一周, loops >= 1
//! - stage 坐标为有限值，z_plan 为有限值且层数有上限
//! - 展开后的事件总数不超过 MAX_SEQUENCE_EVENTS
//! - 漂移表位置为 -1 或有效的 stage position 索引，且不重复
//! - 模拟器参数合法
//! - sink 名称非空且唯一

use std::collections::HashSet;

use contracts::{
    AcquisitionBlueprint, ContractError, ZPlan, MAX_SEQUENCE_EVENTS, MAX_Z_SLICES, NO_POSITION,
};

/// Longest accepted time-lapse interval (one week)
const MAX_INTERVAL_S: f64 = 7.0 * 24.0 * 3600.0;

/// 校验 AcquisitionBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    validate_exposures(blueprint)?;
    validate_time_plan(blueprint)?;
    validate_positions(blueprint)?;
    validate_z_plan(blueprint)?;
    validate_event_count(blueprint)?;
    validate_engine(blueprint)?;
    validate_drift(blueprint)?;
    validate_simulator(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 校验曝光时间
fn validate_exposures(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let sequence = &blueprint.sequence;

    if let Some(default) = sequence.default_exposure_ms {
        if !(default > 0.0) {
            return Err(ContractError::config_validation(
                "sequence.default_exposure_ms",
                format!("exposure must be > 0, got {default}"),
            ));
        }
    }

    if sequence.channels.is_empty() && sequence.default_exposure_ms.is_none() {
        return Err(ContractError::config_validation(
            "sequence.channels",
            "at least one channel or a default_exposure_ms is required",
        ));
    }

    for (idx, channel) in sequence.channels.iter().enumerate() {
        match channel.exposure_ms.or(sequence.default_exposure_ms) {
            Some(exposure) if exposure > 0.0 => {}
            Some(exposure) => {
                return Err(ContractError::config_validation(
                    format!("sequence.channels[{idx}].exposure_ms"),
                    format!("exposure must be > 0, got {exposure}"),
                ));
            }
            None => {
                return Err(ContractError::config_validation(
                    format!("sequence.channels[{idx}].exposure_ms"),
                    format!(
                        "channel '{}' has no exposure and no default_exposure_ms is set",
                        channel.config
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// 校验时间计划
fn validate_time_plan(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let Some(plan) = blueprint.sequence.time_plan else {
        return Ok(());
    };
    if !(0.0..=MAX_INTERVAL_S).contains(&plan.interval_s) {
        return Err(ContractError::config_validation(
            "sequence.time_plan.interval_s",
            format!(
                "interval_s must be within 0..={MAX_INTERVAL_S}, got {}",
                plan.interval_s
            ),
        ));
    }
    if plan.loops == 0 {
        return Err(ContractError::config_validation(
            "sequence.time_plan.loops",
            "loops must be >= 1",
        ));
    }
    Ok(())
}

/// 校验 stage 坐标
fn validate_positions(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    for (idx, position) in blueprint.sequence.stage_positions.iter().enumerate() {
        for (axis, value) in [("x", position.x), ("y", position.y), ("z", position.z)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ContractError::config_validation(
                    format!("sequence.stage_positions[{idx}].{axis}"),
                    "coordinate must be finite",
                ));
            }
        }
    }
    Ok(())
}

/// 校验 z 计划
fn validate_z_plan(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let Some(plan) = &blueprint.sequence.z_plan else {
        return Ok(());
    };
    match plan {
        ZPlan::Relative { relative } => {
            if relative.is_empty() {
                return Err(ContractError::config_validation(
                    "sequence.z_plan.relative",
                    "relative offsets cannot be empty",
                ));
            }
            if relative.iter().any(|offset| !offset.is_finite()) {
                return Err(ContractError::config_validation(
                    "sequence.z_plan.relative",
                    "relative offsets must be finite",
                ));
            }
        }
        ZPlan::RangeAround { range, step } => {
            if !(*step > 0.0) || !step.is_finite() {
                return Err(ContractError::config_validation(
                    "sequence.z_plan.step",
                    format!("step must be > 0, got {step}"),
                ));
            }
            if !(*range >= 0.0) || !range.is_finite() {
                return Err(ContractError::config_validation(
                    "sequence.z_plan.range",
                    format!("range must be >= 0, got {range}"),
                ));
            }
        }
    }
    if plan.slice_count().is_none() {
        return Err(ContractError::config_validation(
            "sequence.z_plan",
            format!("z-stack exceeds {MAX_Z_SLICES} slices"),
        ));
    }
    Ok(())
}

/// 校验展开后的事件总数
fn validate_event_count(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    if blueprint.sequence.event_count().is_none() {
        return Err(ContractError::config_validation(
            "sequence",
            format!("sequence expands to more than {MAX_SEQUENCE_EVENTS} events"),
        ));
    }
    Ok(())
}

/// 校验引擎配置
fn validate_engine(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let time_scale = blueprint.engine.time_scale;
    if !(time_scale >= 0.0) || !time_scale.is_finite() {
        return Err(ContractError::config_validation(
            "engine.time_scale",
            format!("time_scale must be >= 0, got {time_scale}"),
        ));
    }
    Ok(())
}

/// 校验漂移表
fn validate_drift(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let n_positions = blueprint.sequence.stage_positions.len() as i64;
    let mut seen = HashSet::new();
    for (idx, entry) in blueprint.drift.iter().enumerate() {
        if entry.position != NO_POSITION && !(0..n_positions).contains(&entry.position) {
            return Err(ContractError::config_validation(
                format!("drift[{idx}].position"),
                format!(
                    "position {} is neither -1 nor a stage position index (0..{n_positions})",
                    entry.position
                ),
            ));
        }
        if !seen.insert(entry.position) {
            return Err(ContractError::config_validation(
                format!("drift[{idx}].position"),
                format!("duplicate drift entry for position {}", entry.position),
            ));
        }
        if !entry.dx.is_finite() || !entry.dy.is_finite() {
            return Err(ContractError::config_validation(
                format!("drift[{idx}]"),
                "dx / dy must be finite",
            ));
        }
    }
    Ok(())
}

/// 校验模拟器参数
fn validate_simulator(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let sim = &blueprint.simulator;
    if sim.n_particles == 0 {
        return Err(ContractError::config_validation(
            "simulator.n_particles",
            "n_particles must be > 0",
        ));
    }
    if sim.width == 0 || sim.height == 0 {
        return Err(ContractError::config_validation(
            "simulator.width / simulator.height",
            format!("image size must be > 0, got {}x{}", sim.width, sim.height),
        ));
    }
    if !(sim.step_sigma >= 0.0) {
        return Err(ContractError::config_validation(
            "simulator.step_sigma",
            format!("step_sigma must be >= 0, got {}", sim.step_sigma),
        ));
    }
    if !(sim.field_size > 0.0) || !sim.field_size.is_finite() {
        return Err(ContractError::config_validation(
            "simulator.field_size",
            format!("field_size must be > 0, got {}", sim.field_size),
        ));
    }
    if sim.channels == 0 {
        return Err(ContractError::config_validation(
            "simulator.channels",
            "channels must be >= 1",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &AcquisitionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", idx),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}
