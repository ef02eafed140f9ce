//! PINN Live Monitor - keeps live training charts in sync with a remote
//! physics-informed neural network training session
//!
//! The synchronizer polls a progress source on a fixed cadence, appends loss
//! and convergence points under per-series epoch watermarks, drives a progress
//! gauge and stops itself once the session reports completion.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{BackoffPolicy, ProgressReadout, ProgressSynchronizer, ResultsReport, TickOutcome};
pub use domain::{
    ChartSurface, FetchError, ProgressSnapshot, ProgressSource, ResultsSource, SessionKey, SyncEvent,
    TrainingResults, TrainingStatus,
};
pub use infrastructure::{
    AppConfig, ConfigManager, ConsoleChartSurface, HttpProgressSource, MemoryChartSurface,
    SimulatedProgressSource,
};
