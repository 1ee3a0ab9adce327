//! Cardbox (Leitner) review policy.
//!
//! Every question sits in a numbered box. The policy maps a box level to the
//! number of days until the question is due again:
//! - Box 1 is the shortest interval; a miss sends a question back there
//! - Each correct answer moves the question up one box
//! - Intervals never shrink as the box level grows
//! - Levels past the end of the table reuse the last interval (ceiling)

use crate::error::{CardboxError, Result};
use serde::{Deserialize, Serialize};

/// Default intervals in days for boxes 1 through 11.
pub const DEFAULT_INTERVALS: [u32; 11] = [1, 4, 7, 12, 20, 30, 60, 90, 150, 270, 480];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct CardboxPolicy {
    intervals: Vec<u32>,
}

impl CardboxPolicy {
    /// Builds a policy from intervals for boxes `1..=intervals.len()`.
    pub fn new(intervals: Vec<u32>) -> Result<Self> {
        if intervals.is_empty() {
            return Err(CardboxError::InvalidPolicy(
                "at least one interval is required".to_string(),
            ));
        }
        if let Some(pos) = intervals.iter().position(|&days| days == 0) {
            return Err(CardboxError::InvalidPolicy(format!(
                "box {} has a zero-day interval",
                pos + 1
            )));
        }
        if let Some(pos) = intervals.windows(2).position(|w| w[1] < w[0]) {
            return Err(CardboxError::InvalidPolicy(format!(
                "interval for box {} ({} days) is shorter than box {} ({} days)",
                pos + 2,
                intervals[pos + 1],
                pos + 1,
                intervals[pos]
            )));
        }
        Ok(Self { intervals })
    }

    /// Days until a question in box `level` is due again.
    /// Level 0 is treated as level 1.
    pub fn interval_days(&self, level: u32) -> u32 {
        let idx = (level.max(1) as usize - 1).min(self.intervals.len() - 1);
        self.intervals[idx]
    }

    /// Highest box level with its own interval; everything above shares it.
    pub fn max_level(&self) -> u32 {
        self.intervals.len() as u32
    }

    pub fn intervals(&self) -> &[u32] {
        &self.intervals
    }
}

impl Default for CardboxPolicy {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS.to_vec(),
        }
    }
}

impl TryFrom<Vec<u32>> for CardboxPolicy {
    type Error = CardboxError;

    fn try_from(intervals: Vec<u32>) -> Result<Self> {
        Self::new(intervals)
    }
}

impl From<CardboxPolicy> for Vec<u32> {
    fn from(policy: CardboxPolicy) -> Self {
        policy.intervals
    }
}
