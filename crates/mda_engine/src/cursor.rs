//! Simulated time cursor

/// Highest time index the simulated scene has been stepped to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedTimeCursor {
    current: usize,
}

impl SimulatedTimeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }

    /// Move to `t`; true only if `t` is strictly ahead of the cursor.
    pub fn advance(&mut self, t: usize) -> bool {
        if t > self.current {
            self.current = t;
            true
        } else {
            false
        }
    }
}
