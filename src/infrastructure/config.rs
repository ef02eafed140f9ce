//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate, lowest priority first:
//! 1. Built-in defaults (`AppConfig::default()`, see [`defaults`])
//! 2. An optional JSON/TOML file (explicit path or the per-user config dir)
//! 3. Environment variables prefixed `PINN_MONITOR__`, e.g.
//!    `PINN_MONITOR__POLLING__INTERVAL_MS=250`

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;
use url::Url;

use crate::application::backoff::BackoffPolicy;
use crate::domain::session::SessionKey;
use crate::infrastructure::http_client::HttpClientConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Training service connection
    pub server: HttpClientConfig,

    /// Poll cadence and failure handling
    pub polling: PollingConfig,

    /// Which training session to follow
    pub session: SessionKey,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between ticks in milliseconds
    pub interval_ms: u64,

    /// Delay growth after failed ticks (disabled by default)
    pub backoff: BackoffPolicy,
}

impl PollingConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::POLL_INTERVAL_MS,
            backoff: BackoffPolicy::disabled(),
        }
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Directory for log files; the per-user data dir when unset
    pub log_dir: Option<String>,

    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("hyper_util".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be greater than 0");
        }

        Url::parse(&self.server.base_url)
            .with_context(|| format!("server.base_url is not a valid URL: {}", self.server.base_url))?;

        self.session.validate().context("Invalid session")?;

        if self.polling.backoff.enabled && self.polling.backoff.multiplier < 1.0 {
            anyhow::bail!("polling.backoff.multiplier must be at least 1.0");
        }

        Ok(())
    }
}

/// Configuration manager for loading and saving settings
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory (logs, exports)
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Manager for the default per-user config file
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load defaults, then the config file if present, then the environment
    pub fn load_config(&self) -> Result<AppConfig> {
        self.load_with_env(None)
    }

    /// Same as [`Self::load_config`] with an explicit environment map in place
    /// of the process environment
    pub fn load_with_env(&self, env: Option<HashMap<String, String>>) -> Result<AppConfig> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        if self.config_path.exists() {
            info!("Loading configuration from: {:?}", self.config_path);
            builder = builder.add_source(config::File::from(self.config_path.as_path()));
        } else {
            info!(
                "Configuration file not found, using defaults: {:?}",
                self.config_path
            );
        }

        let environment = config::Environment::with_prefix(defaults::ENV_PREFIX)
            .prefix_separator(defaults::ENV_SEPARATOR)
            .separator(defaults::ENV_SEPARATOR)
            .try_parsing(true)
            .source(env);

        let config: AppConfig = builder
            .add_source(environment)
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file as pretty JSON
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    use crate::domain::constants::DEFAULT_POLL_INTERVAL_MS;

    pub const APP_DIR_NAME: &str = "pinn-live-monitor";

    pub const CONFIG_FILE_NAME: &str = "pinn_monitor_config.json";

    /// Environment variable prefix, joined to keys with `__`
    pub const ENV_PREFIX: &str = "PINN_MONITOR";
    pub const ENV_SEPARATOR: &str = "__";

    pub const POLL_INTERVAL_MS: u64 = DEFAULT_POLL_INTERVAL_MS;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = false;

    pub const LOG_FILE_NAME: &str = "pinn-monitor.log";

    pub const LOG_MAX_FILES: u32 = 5;
}
