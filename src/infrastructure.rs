//! Infrastructure layer for the training service, chart surfaces and ambient setup
//!
//! HTTP and simulated progress sources, in-memory and console chart surfaces,
//! layered configuration and logging initialization.

pub mod chart_surface;
pub mod config;
pub mod http_client;
pub mod logging;
pub mod simulated_source;

pub use chart_surface::{ConsoleChartSurface, MemoryChartSurface};
pub use config::{AppConfig, ConfigManager, LoggingConfig, PollingConfig};
pub use http_client::{HttpClientConfig, HttpProgressSource};
pub use logging::{cleanup_old_logs, get_log_directory, init_logging_with_config};
pub use simulated_source::{SimulatedProgressSource, SimulationConfig};
