//! Service seams of the monitor
//!
//! The synchronizer only talks to these traits, so the HTTP source, the
//! simulated source and the chart surfaces can be swapped freely (and faked in
//! tests).

use async_trait::async_trait;

use crate::domain::errors::FetchError;
use crate::domain::progress::ProgressSnapshot;
use crate::domain::results::TrainingResults;
use crate::domain::session::SessionKey;

/// Where progress snapshots come from
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Fetch the current progress snapshot for a session
    async fn fetch_progress(&self, key: &SessionKey) -> Result<ProgressSnapshot, FetchError>;
}

/// Where final results come from once training has completed
#[async_trait]
pub trait ResultsSource: Send + Sync {
    async fn fetch_results(&self, key: &SessionKey) -> Result<TrainingResults, FetchError>;
}

/// Opaque handle to a series group (or gauge) created on a chart surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesHandle(pub usize);

/// Append-only, multi-series chart that redraws on append
pub trait ChartSurface: Send {
    /// Create a group of named series sharing one x axis
    fn create_series(&mut self, names: &[&str]) -> SeriesHandle;

    /// Append `(x, y)` to series `series_index` of the group
    fn append_point(&mut self, handle: SeriesHandle, series_index: usize, x: f64, y: f64);

    /// Set a gauge-style value
    fn set_value(&mut self, handle: SeriesHandle, y: f64);

    /// Rescale the y axis after new data
    fn autoscale(&mut self, handle: SeriesHandle);
}
