//! Per-series epoch watermark
//!
//! Every chart series keeps the highest epoch it has already received. A new
//! point is admitted only when its epoch moves past that mark, except for the
//! terminal snapshot which is always flushed so the final point is never lost
//! to a race between the last periodic tick and completion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesWatermark {
    last_appended: Option<u64>,
}

impl SeriesWatermark {
    pub const fn new() -> Self {
        Self { last_appended: None }
    }

    /// Highest epoch already committed to the series
    pub const fn last_appended(&self) -> Option<u64> {
        self.last_appended
    }

    /// Append rule: `terminal OR unset OR epoch > last_appended`
    pub fn admits(&self, epoch: u64, terminal: bool) -> bool {
        terminal || self.last_appended.is_none_or(|last| epoch > last)
    }

    /// Record that `epoch` was appended.
    ///
    /// The mark never moves backwards; a terminal flush of an older epoch
    /// leaves it where it was.
    pub fn commit(&mut self, epoch: u64) {
        self.last_appended = Some(self.last_appended.map_or(epoch, |last| last.max(epoch)));
    }

    /// Check and commit in one step. Returns whether the point should be appended.
    pub fn try_advance(&mut self, epoch: u64, terminal: bool) -> bool {
        if self.admits(epoch, terminal) {
            self.commit(epoch);
            true
        } else {
            false
        }
    }
}
