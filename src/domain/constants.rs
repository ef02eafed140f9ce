//! Domain constants shared across the monitor

/// Purpose key used when none is configured
pub const DEFAULT_PURPOSE: &str = "forward_problems";

/// Equation type used when none is configured
pub const DEFAULT_EQUATION_TYPE: &str = "heat";

/// Poll cadence observed on the live training page
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Path template segments of the progress endpoint: `/api/training-progress/{purpose}/{equation}`
pub const PROGRESS_PATH: [&str; 2] = ["api", "training-progress"];

/// Results endpoint: `/purpose/{purpose}/api/results/{equation}`
pub const RESULTS_PURPOSE_SEGMENT: &str = "purpose";
pub const RESULTS_API_SEGMENTS: [&str; 2] = ["api", "results"];

/// Gauge delta reference trails the gauge value by this many points
pub const GAUGE_DELTA_OFFSET: f64 = 5.0;

pub const STATUS_TEXT_IN_PROGRESS: &str = "Training in Progress...";
pub const STATUS_TEXT_COMPLETED: &str = "Training Completed";

/// Placeholder for any readout without a value
pub const NOT_AVAILABLE: &str = "N/A";

/// Series name of the convergence chart
pub const CONVERGENCE_SERIES_NAME: &str = "Convergence Rate";

/// Series name of the progress gauge
pub const PROGRESS_GAUGE_NAME: &str = "Training Progress";
