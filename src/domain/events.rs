//! Events published by the progress synchronizer
//!
//! Host code (the CLI, a UI shell, tests) subscribes to these through a
//! broadcast channel to reveal results, log progress or stop waiting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::SessionKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Polling timer started
    Started {
        session: SessionKey,
        interval_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A snapshot went through the update path
    SnapshotApplied {
        epoch: Option<u64>,
        percentage: Option<u8>,
        loss_appended: bool,
        convergence_appended: bool,
    },
    /// One tick failed; polling continues
    TickFailed {
        kind: String,
        message: String,
        consecutive_failures: u32,
    },
    /// Terminal snapshot applied; polling has stopped for good
    Completed {
        session: SessionKey,
        final_epoch: Option<u64>,
        timestamp: DateTime<Utc>,
    },
    /// Polling timer released
    Stopped { timestamp: DateTime<Utc> },
}

impl SyncEvent {
    /// Event name used in logs
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "sync-started",
            Self::SnapshotApplied { .. } => "snapshot-applied",
            Self::TickFailed { .. } => "tick-failed",
            Self::Completed { .. } => "training-completed",
            Self::Stopped { .. } => "sync-stopped",
        }
    }
}
