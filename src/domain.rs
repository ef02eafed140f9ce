//! Domain module - progress snapshots, watermarks and service seams
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod constants;
pub mod errors;
pub mod events;
pub mod progress;
pub mod results;
pub mod services;
pub mod session;
pub mod watermark;

pub use errors::{FetchError, SessionError};
pub use events::SyncEvent;
pub use progress::{LossComponents, ProgressSnapshot, TrainingStatus};
pub use results::{ResultMetrics, ResultsSummary, TrainingResults};
pub use services::{ChartSurface, ProgressSource, ResultsSource, SeriesHandle};
pub use session::SessionKey;
pub use watermark::SeriesWatermark;
