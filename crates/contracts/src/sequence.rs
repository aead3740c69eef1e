//! MdaSequence - ordered acquisition events
//!
//! A sequence is either built from explicit events or expanded from a
//! [`SequencePlan`] (time-lapse / stage positions / channels / z-stack).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Axis, Channel, EventIndex, MdaEvent};

/// Time-lapse plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePlan {
    /// Interval between time points (seconds)
    pub interval_s: f64,
    /// Number of time points
    pub loops: usize,
}

/// Stage position (absolute)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePosition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

/// Z-stack plan, offsets relative to the position's z
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZPlan {
    /// Explicit relative offsets
    Relative { relative: Vec<f64> },
    /// Symmetric range around the position's z
    RangeAround { range: f64, step: f64 },
}

/// Largest z-stack a plan may describe
pub const MAX_Z_SLICES: usize = 10_000;

/// Largest number of events a plan may expand to
pub const MAX_SEQUENCE_EVENTS: usize = 1_000_000;

impl ZPlan {
    /// Number of slices, or `None` for a non-finite or oversized stack
    pub fn slice_count(&self) -> Option<usize> {
        let slices = match self {
            ZPlan::Relative { relative } => relative.len(),
            ZPlan::RangeAround { range, step } => {
                if !range.is_finite() || !step.is_finite() {
                    return None;
                }
                if *step <= 0.0 || *range <= 0.0 {
                    return Some(1);
                }
                let intervals = (range / step).round();
                if intervals >= MAX_Z_SLICES as f64 {
                    return None;
                }
                intervals as usize + 1
            }
        };
        (slices <= MAX_Z_SLICES).then_some(slices)
    }

    /// Relative offsets in acquisition order. Empty when `slice_count` is `None`.
    pub fn offsets(&self) -> Vec<f64> {
        let Some(slices) = self.slice_count() else {
            return Vec::new();
        };
        match self {
            ZPlan::Relative { relative } => relative.clone(),
            ZPlan::RangeAround { range, step } => {
                if *step <= 0.0 || *range <= 0.0 {
                    return vec![0.0];
                }
                let start = -range / 2.0;
                (0..slices).map(|i| start + i as f64 * step).collect()
            }
        }
    }
}

/// Loop nesting order, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisOrder(Vec<Axis>);

impl AxisOrder {
    /// Parse from letters, e.g. "tpcz"
    pub fn parse(order: &str) -> Result<Self, String> {
        let mut axes = Vec::with_capacity(order.len());
        for label in order.chars() {
            let axis = Axis::from_label(label)
                .ok_or_else(|| format!("unknown axis '{label}' in axis_order '{order}'"))?;
            if axes.contains(&axis) {
                return Err(format!("axis '{label}' repeated in axis_order '{order}'"));
            }
            axes.push(axis);
        }
        Ok(Self(axes))
    }

    pub fn axes(&self) -> &[Axis] {
        &self.0
    }

    /// Order extended with any axis it does not name (innermost)
    fn complete(&self) -> Vec<Axis> {
        let mut axes = self.0.clone();
        for axis in [Axis::Time, Axis::Position, Axis::Channel, Axis::Z] {
            if !axes.contains(&axis) {
                axes.push(axis);
            }
        }
        axes
    }
}

impl Default for AxisOrder {
    fn default() -> Self {
        Self(vec![Axis::Time, Axis::Position, Axis::Channel, Axis::Z])
    }
}

impl TryFrom<String> for AxisOrder {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AxisOrder> for String {
    fn from(order: AxisOrder) -> Self {
        order.to_string()
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in &self.0 {
            write!(f, "{}", axis.label())?;
        }
        Ok(())
    }
}

/// Multi-dimensional acquisition plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePlan {
    /// Time-lapse
    #[serde(default)]
    pub time_plan: Option<TimePlan>,

    /// Stage positions
    #[serde(default)]
    pub stage_positions: Vec<StagePosition>,

    /// Channels
    #[serde(default)]
    pub channels: Vec<Channel>,

    /// Z-stack
    #[serde(default)]
    pub z_plan: Option<ZPlan>,

    /// Loop nesting order
    #[serde(default)]
    pub axis_order: AxisOrder,

    /// Exposure used when a channel does not set one (ms)
    #[serde(default)]
    pub default_exposure_ms: Option<f64>,
}

impl SequencePlan {
    /// Size of each present dimension, in nesting order
    pub fn shape(&self) -> Vec<(Axis, usize)> {
        let z_slices = self
            .z_plan
            .as_ref()
            .and_then(ZPlan::slice_count)
            .unwrap_or(0);
        self.axis_order
            .complete()
            .into_iter()
            .filter_map(|axis| {
                let size = match axis {
                    Axis::Time => self.time_plan.map(|plan| plan.loops).unwrap_or(0),
                    Axis::Position => self.stage_positions.len(),
                    Axis::Channel => self.channels.len(),
                    Axis::Z => z_slices,
                };
                (size > 0).then_some((axis, size))
            })
            .collect()
    }

    /// Number of events `expand` yields, or `None` when the z-stack is invalid
    /// or the total exceeds [`MAX_SEQUENCE_EVENTS`]
    pub fn event_count(&self) -> Option<usize> {
        Self::checked_total(self.z_plan.as_ref(), &self.shape())
    }

    fn checked_total(z_plan: Option<&ZPlan>, shape: &[(Axis, usize)]) -> Option<usize> {
        if z_plan.is_some_and(|z| z.slice_count().is_none()) {
            return None;
        }
        shape
            .iter()
            .try_fold(1usize, |total, (_, size)| total.checked_mul(*size))
            .filter(|total| *total <= MAX_SEQUENCE_EVENTS)
    }

    /// Expand into events, outermost axis first.
    ///
    /// A plan whose `event_count` is `None` expands to no events; validate first.
    pub fn expand(&self) -> Vec<MdaEvent> {
        let shape = self.shape();
        let Some(total) = Self::checked_total(self.z_plan.as_ref(), &shape) else {
            return Vec::new();
        };
        let z_offsets = self
            .z_plan
            .as_ref()
            .map(ZPlan::offsets)
            .unwrap_or_default();
        if shape.is_empty() {
            return vec![self.build_event(EventIndex::new(), &z_offsets)];
        }

        let mut events = Vec::with_capacity(total);
        let mut counters = vec![0usize; shape.len()];
        for _ in 0..total {
            let index = shape
                .iter()
                .zip(&counters)
                .fold(EventIndex::new(), |index, ((axis, _), i)| {
                    index.with(*axis, *i)
                });
            events.push(self.build_event(index, &z_offsets));

            // odometer, innermost axis fastest
            for slot in (0..shape.len()).rev() {
                counters[slot] += 1;
                if counters[slot] < shape[slot].1 {
                    break;
                }
                counters[slot] = 0;
            }
        }
        events
    }

    fn build_event(&self, index: EventIndex, z_offsets: &[f64]) -> MdaEvent {
        let position = index
            .get(Axis::Position)
            .and_then(|p| self.stage_positions.get(p));
        let channel = index.get(Axis::Channel).and_then(|c| self.channels.get(c));
        let z_offset = index.get(Axis::Z).and_then(|z| z_offsets.get(z)).copied();

        let base_z = position.and_then(|p| p.z);
        let z_pos = match z_offset {
            Some(offset) => Some(base_z.unwrap_or(0.0) + offset),
            None => base_z,
        };

        let min_start_time = self
            .time_plan
            .map(|plan| index.time() as f64 * plan.interval_s);

        MdaEvent {
            x_pos: position.and_then(|p| p.x),
            y_pos: position.and_then(|p| p.y),
            z_pos,
            exposure_ms: channel
                .and_then(|c| c.exposure_ms)
                .or(self.default_exposure_ms),
            channel: channel.cloned(),
            min_start_time,
            index,
        }
    }
}

/// Ordered acquisition sequence
///
/// Engines iterate it in order; they never reorder or filter events.
#[derive(Debug, Clone)]
pub struct MdaSequence {
    uid: Uuid,
    events: Vec<MdaEvent>,
    plan: Option<SequencePlan>,
}

impl MdaSequence {
    /// Sequence over explicit events
    pub fn from_events(events: Vec<MdaEvent>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            events,
            plan: None,
        }
    }

    /// Sequence expanded from a plan
    pub fn from_plan(plan: SequencePlan) -> Self {
        Self {
            uid: Uuid::new_v4(),
            events: plan.expand(),
            plan: Some(plan),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn plan(&self) -> Option<&SequencePlan> {
        self.plan.as_ref()
    }

    pub fn events(&self) -> &[MdaEvent] {
        &self.events
    }

    /// Events in acquisition order (owned copies)
    pub fn iter(&self) -> impl Iterator<Item = MdaEvent> + '_ {
        self.events.iter().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(config: &str, exposure_ms: f64) -> Channel {
        Channel {
            group: "Channel".into(),
            config: config.into(),
            exposure_ms: Some(exposure_ms),
        }
    }

    fn plan() -> SequencePlan {
        SequencePlan {
            time_plan: Some(TimePlan {
                interval_s: 2.0,
                loops: 3,
            }),
            stage_positions: vec![
                StagePosition {
                    x: Some(0.0),
                    y: Some(0.0),
                    z: Some(10.0),
                    ..Default::default()
                },
                StagePosition {
                    x: Some(100.0),
                    y: Some(-50.0),
                    z: None,
                    ..Default::default()
                },
            ],
            channels: vec![channel("DAPI", 10.0), channel("FITC", 20.0)],
            z_plan: None,
            axis_order: AxisOrder::default(),
            default_exposure_ms: None,
        }
    }

    #[test]
    fn test_expand_count_and_order() {
        let events = plan().expand();
        assert_eq!(events.len(), 3 * 2 * 2);

        // tpcz: channel changes fastest, then position, then time
        assert_eq!(events[0].index.channel(), 0);
        assert_eq!(events[1].index.channel(), 1);
        assert_eq!(events[2].index.position_key(), 1);
        assert_eq!(events[4].index.time(), 1);
        assert_eq!(events[4].min_start_time, Some(2.0));
        assert_eq!(events[2].x_pos, Some(100.0));
        assert_eq!(events[1].exposure_ms, Some(20.0));
        assert_eq!(events[0].index.get(Axis::Z), None);
    }

    #[test]
    fn test_expand_custom_order() {
        let mut plan = plan();
        plan.axis_order = AxisOrder::parse("pct").unwrap();
        let events = plan.expand();
        // time is innermost
        assert_eq!(events[0].index.time(), 0);
        assert_eq!(events[1].index.time(), 1);
        assert_eq!(events[3].index.channel(), 1);
    }

    #[test]
    fn test_z_plan_offsets() {
        let mut plan = plan();
        plan.time_plan = None;
        plan.channels.clear();
        plan.z_plan = Some(ZPlan::RangeAround {
            range: 2.0,
            step: 1.0,
        });
        let events = plan.expand();
        assert_eq!(events.len(), 2 * 3);
        assert_eq!(events[0].z_pos, Some(9.0));
        assert_eq!(events[2].z_pos, Some(11.0));
        // second position has no z: offsets apply around 0
        assert_eq!(events[3].z_pos, Some(-1.0));
        assert_eq!(events[0].min_start_time, None);
    }

    #[test]
    fn test_unbounded_z_range_expands_to_nothing() {
        let mut plan = plan();
        plan.z_plan = Some(ZPlan::RangeAround {
            range: f64::INFINITY,
            step: 1.0,
        });
        assert_eq!(plan.z_plan.as_ref().unwrap().slice_count(), None);
        assert!(plan.z_plan.as_ref().unwrap().offsets().is_empty());
        assert_eq!(plan.event_count(), None);
        assert!(plan.expand().is_empty());

        plan.z_plan = Some(ZPlan::RangeAround {
            range: 1e12,
            step: 1.0,
        });
        assert_eq!(plan.event_count(), None);
    }

    #[test]
    fn test_event_count_overflow_is_rejected() {
        let mut plan = plan();
        plan.time_plan = Some(TimePlan {
            interval_s: 1.0,
            loops: usize::MAX,
        });
        assert_eq!(plan.event_count(), None);
        assert!(plan.expand().is_empty());
    }

    #[test]
    fn test_event_count_matches_expand() {
        let mut plan = plan();
        plan.z_plan = Some(ZPlan::Relative {
            relative: vec![-1.0, 0.0, 1.0],
        });
        assert_eq!(plan.event_count(), Some(3 * 2 * 2 * 3));
        assert_eq!(plan.expand().len(), 36);
    }

    #[test]
    fn test_empty_plan_is_single_event() {
        let plan = SequencePlan {
            default_exposure_ms: Some(5.0),
            ..Default::default()
        };
        let events = plan.expand();
        assert_eq!(events.len(), 1);
        assert!(events[0].index.is_empty());
        assert_eq!(events[0].exposure_ms, Some(5.0));
    }

    #[test]
    fn test_axis_order_parse() {
        assert!(AxisOrder::parse("tpcz").is_ok());
        assert!(AxisOrder::parse("tt").is_err());
        assert!(AxisOrder::parse("tpq").is_err());
        assert_eq!(AxisOrder::parse("ZCT").unwrap().to_string(), "zct");
    }

    #[test]
    fn test_sequence_iterates_in_order() {
        let sequence = MdaSequence::from_plan(plan());
        let times: Vec<usize> = sequence.iter().map(|e| e.index.time()).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(sequence.len(), 12);
    }
}
