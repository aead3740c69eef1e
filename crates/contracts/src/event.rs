//! MdaEvent - one scheduled unit of an acquisition sequence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Position key used when an event carries no position dimension.
pub const NO_POSITION: i64 = -1;

/// Sequence dimension label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "t")]
    Time,
    #[serde(rename = "p")]
    Position,
    #[serde(rename = "c")]
    Channel,
    #[serde(rename = "z")]
    Z,
}

impl Axis {
    /// Single-letter label ("t", "p", "c", "z")
    pub fn label(self) -> char {
        match self {
            Axis::Time => 't',
            Axis::Position => 'p',
            Axis::Channel => 'c',
            Axis::Z => 'z',
        }
    }

    /// Parse a single-letter label
    pub fn from_label(label: char) -> Option<Self> {
        match label.to_ascii_lowercase() {
            't' => Some(Axis::Time),
            'p' => Some(Axis::Position),
            'c' => Some(Axis::Channel),
            'z' => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Mapping from dimension to index within that dimension.
///
/// Keys are only present for dimensions the sequence actually has.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventIndex(BTreeMap<Axis, usize>);

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, axis: Axis, index: usize) -> Self {
        self.0.insert(axis, index);
        self
    }

    pub fn insert(&mut self, axis: Axis, index: usize) {
        self.0.insert(axis, index);
    }

    pub fn get(&self, axis: Axis) -> Option<usize> {
        self.0.get(&axis).copied()
    }

    /// Time index, 0 when the sequence has no time dimension
    pub fn time(&self) -> usize {
        self.get(Axis::Time).unwrap_or(0)
    }

    /// Channel index, 0 when the sequence has no channel dimension
    pub fn channel(&self) -> usize {
        self.get(Axis::Channel).unwrap_or(0)
    }

    /// Position key for drift lookups, [`NO_POSITION`] when absent
    pub fn position_key(&self) -> i64 {
        self.get(Axis::Position)
            .map(|p| p as i64)
            .unwrap_or(NO_POSITION)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, usize)> + '_ {
        self.0.iter().map(|(axis, index)| (*axis, *index))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (axis, index)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", axis.label(), index)?;
        }
        write!(f, "}}")
    }
}

/// Channel (config group + preset) with its exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Config group name (e.g. "Channel")
    #[serde(default = "default_channel_group")]
    pub group: String,

    /// Preset name (e.g. "DAPI")
    pub config: String,

    /// Exposure in milliseconds
    #[serde(default)]
    pub exposure_ms: Option<f64>,
}

fn default_channel_group() -> String {
    "Channel".to_string()
}

/// Acquisition event
///
/// Value type: engines receive clones from the sequence and never write back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MdaEvent {
    /// Dimension indices
    #[serde(default)]
    pub index: EventIndex,

    /// Stage X target (None = leave axis where it is)
    #[serde(default)]
    pub x_pos: Option<f64>,

    /// Stage Y target
    #[serde(default)]
    pub y_pos: Option<f64>,

    /// Focus target
    #[serde(default)]
    pub z_pos: Option<f64>,

    /// Exposure in milliseconds
    #[serde(default)]
    pub exposure_ms: Option<f64>,

    /// Channel preset
    #[serde(default)]
    pub channel: Option<Channel>,

    /// Earliest start, seconds since run start
    #[serde(default)]
    pub min_start_time: Option<f64>,
}

impl MdaEvent {
    /// Event with the given index and no hardware targets
    pub fn with_index(index: EventIndex) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Builder-style XY target
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x_pos = Some(x);
        self.y_pos = Some(y);
        self
    }
}

impl fmt::Display for MdaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MdaEvent(index={}", self.index)?;
        if let Some(x) = self.x_pos {
            write!(f, ", x={x:.3}")?;
        }
        if let Some(y) = self.y_pos {
            write!(f, ", y={y:.3}")?;
        }
        if let Some(z) = self.z_pos {
            write!(f, ", z={z:.3}")?;
        }
        if let Some(channel) = &self.channel {
            write!(f, ", channel={}", channel.config)?;
        }
        if let Some(exposure) = self.exposure_ms {
            write!(f, ", exposure={exposure}ms")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_defaults() {
        let index = EventIndex::new();
        assert_eq!(index.time(), 0);
        assert_eq!(index.channel(), 0);
        assert_eq!(index.position_key(), NO_POSITION);

        let index = EventIndex::new()
            .with(Axis::Time, 3)
            .with(Axis::Position, 2);
        assert_eq!(index.time(), 3);
        assert_eq!(index.position_key(), 2);
    }

    #[test]
    fn test_axis_labels() {
        for axis in [Axis::Time, Axis::Position, Axis::Channel, Axis::Z] {
            assert_eq!(Axis::from_label(axis.label()), Some(axis));
        }
        assert_eq!(Axis::from_label('T'), Some(Axis::Time));
        assert_eq!(Axis::from_label('g'), None);
    }

    #[test]
    fn test_index_serializes_with_labels() {
        let index = EventIndex::new().with(Axis::Time, 1).with(Axis::Channel, 0);
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"t":1,"c":0}"#);
    }

    #[test]
    fn test_event_display() {
        let event = MdaEvent::with_index(EventIndex::new().with(Axis::Position, 1)).at(1.0, 2.5);
        assert_eq!(event.to_string(), "MdaEvent(index={p: 1}, x=1.000, y=2.500)");
    }
}
