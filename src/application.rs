//! Application layer - progress synchronization and results reporting

pub mod backoff;
pub mod progress_synchronizer;
pub mod readout;
pub mod report;

pub use backoff::BackoffPolicy;
pub use progress_synchronizer::{ApplyOutcome, ProgressSynchronizer, SyncState, TickOutcome};
pub use readout::ProgressReadout;
pub use report::{ResultsReport, SeriesHistory};
