//! DriftTable - per-position stage offsets
//!
//! 每个位置索引对应一个 (x, y) 漂移量，移动硬件前从目标坐标中减去。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use crate::MdaEvent;

/// XY drift offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftVector {
    pub x: f64,
    pub y: f64,
}

impl DriftVector {
    pub const ZERO: DriftVector = DriftVector { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add for DriftVector {
    type Output = DriftVector;

    fn add(self, rhs: Self) -> Self::Output {
        DriftVector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for DriftVector {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Serialized form of one table row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftEntry {
    /// Position index, -1 when the sequence has no position dimension
    pub position: i64,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
}

/// Position key -> drift offset
///
/// Reads never insert: a missing key is the zero vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<DriftEntry>", into = "Vec<DriftEntry>")]
pub struct DriftTable {
    offsets: BTreeMap<i64, DriftVector>,
}

impl DriftTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset for a position key (zero when absent)
    pub fn offset(&self, position: i64) -> DriftVector {
        self.offsets.get(&position).copied().unwrap_or_default()
    }

    /// Replace the offset for a position, returning the previous one
    pub fn set(&mut self, position: i64, offset: DriftVector) -> Option<DriftVector> {
        self.offsets.insert(position, offset)
    }

    /// Add to the stored offset (starting from zero)
    pub fn accumulate(&mut self, position: i64, delta: DriftVector) -> DriftVector {
        let entry = self.offsets.entry(position).or_default();
        *entry += delta;
        *entry
    }

    pub fn remove(&mut self, position: i64) -> Option<DriftVector> {
        self.offsets.remove(&position)
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn contains(&self, position: i64) -> bool {
        self.offsets.contains_key(&position)
    }

    /// Entries ordered by position key
    pub fn iter(&self) -> impl Iterator<Item = (i64, DriftVector)> + '_ {
        self.offsets.iter().map(|(p, v)| (*p, *v))
    }

    /// Copy of `event` with x/y shifted by minus the position's offset.
    ///
    /// Absent coordinates stay absent.
    pub fn correct(&self, event: &MdaEvent) -> MdaEvent {
        let offset = self.offset(event.index.position_key());
        let mut corrected = event.clone();
        corrected.x_pos = event.x_pos.map(|x| x - offset.x);
        corrected.y_pos = event.y_pos.map(|y| y - offset.y);
        corrected
    }
}

impl From<Vec<DriftEntry>> for DriftTable {
    fn from(entries: Vec<DriftEntry>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<DriftTable> for Vec<DriftEntry> {
    fn from(table: DriftTable) -> Self {
        table
            .iter()
            .map(|(position, v)| DriftEntry {
                position,
                dx: v.x,
                dy: v.y,
            })
            .collect()
    }
}

impl FromIterator<DriftEntry> for DriftTable {
    fn from_iter<I: IntoIterator<Item = DriftEntry>>(iter: I) -> Self {
        let mut table = DriftTable::new();
        for entry in iter {
            table.set(entry.position, DriftVector::new(entry.dx, entry.dy));
        }
        table
    }
}
