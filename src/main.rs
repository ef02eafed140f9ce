//! `pinn-live-monitor` command line entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use pinn_live_monitor_lib::application::{ProgressSynchronizer, ResultsReport};
use pinn_live_monitor_lib::domain::constants::NOT_AVAILABLE;
use pinn_live_monitor_lib::domain::{ProgressSource, ResultsSource, SyncEvent};
use pinn_live_monitor_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use pinn_live_monitor_lib::infrastructure::{
    AppConfig, ConfigManager, ConsoleChartSurface, HttpProgressSource, MemoryChartSurface,
    SimulatedProgressSource,
};

/// Follow a live PINN training session and keep its charts up to date
#[derive(Parser, Debug)]
#[command(name = "pinn-live-monitor", version, about)]
struct Cli {
    /// Config file (JSON or TOML); defaults to the per-user config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Purpose key, e.g. forward_problems
    #[arg(long)]
    purpose: Option<String>,

    /// Equation type, e.g. heat
    #[arg(long)]
    equation: Option<String>,

    /// Training service root URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Use the offline simulated source instead of the HTTP service
    #[arg(long)]
    simulate: bool,

    /// Total epochs of the simulated run
    #[arg(long, value_name = "N", default_value_t = 1000, requires = "simulate")]
    simulate_epochs: u64,

    /// Directory for the results report; the per-user data dir when omitted
    #[arg(long, value_name = "DIR")]
    export_dir: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(purpose) = &self.purpose {
            config.session.purpose.clone_from(purpose);
        }
        if let Some(equation) = &self.equation {
            config.session.equation_type.clone_from(equation);
        }
        if let Some(base_url) = &self.base_url {
            config.server.base_url.clone_from(base_url);
        }
        if let Some(interval_ms) = self.interval_ms {
            config.polling.interval_ms = interval_ms;
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config()?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn spawn_event_logger(sync: &ProgressSynchronizer) -> tokio::task::JoinHandle<()> {
    let mut events = sync.subscribe();
    let mut readout = sync.readout();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(SyncEvent::Completed { session, final_epoch, .. }) => {
                        info!("🏁 {} finished at epoch {:?}", session, final_epoch);
                    }
                    Ok(event) => debug!("Sync event: {}", event.event_name()),
                    Err(RecvError::Lagged(skipped)) => warn!("Event logger skipped {} events", skipped),
                    Err(RecvError::Closed) => break,
                },
                changed = readout.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = readout.borrow_and_update().clone();
                    info!(
                        "{} | total loss {} | {}",
                        current.progress_text.as_deref().unwrap_or("Waiting for progress"),
                        current.total_loss.as_deref().unwrap_or(NOT_AVAILABLE),
                        current.status_text
                    );
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging_with_config(&config.logging)?;
    log_system_info();

    let (progress, results): (Arc<dyn ProgressSource>, Arc<dyn ResultsSource>) = if cli.simulate {
        info!("🧪 Using simulated training run with {} epochs", cli.simulate_epochs);
        let source = Arc::new(SimulatedProgressSource::with_epochs(cli.simulate_epochs, 10));
        let progress: Arc<dyn ProgressSource> = source.clone();
        let results: Arc<dyn ResultsSource> = source;
        (progress, results)
    } else {
        let source = Arc::new(HttpProgressSource::new(config.server.clone())?);
        info!("🌐 Following {} at {}", config.session, config.server.base_url);
        let progress: Arc<dyn ProgressSource> = source.clone();
        let results: Arc<dyn ResultsSource> = source;
        (progress, results)
    };

    let recorder = MemoryChartSurface::new();
    let sync = ProgressSynchronizer::with_backoff(
        config.session.clone(),
        progress,
        Box::new(ConsoleChartSurface::new(recorder.clone())),
        config.polling.backoff.clone(),
    );

    let logger = spawn_event_logger(&sync);
    sync.start(config.polling.interval());

    let completed = tokio::select! {
        () = sync.wait_for_completion() => true,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, stopping polling");
            false
        }
    };
    sync.stop();

    let training_results = if completed {
        match results.fetch_results(sync.session()).await {
            Ok(results) => Some(results),
            Err(e) => {
                warn!("⚠️  Could not fetch final results ({}): {}", e.kind(), e);
                None
            }
        }
    } else {
        None
    };

    let export_dir = match cli.export_dir {
        Some(dir) => dir,
        None => ConfigManager::get_app_data_dir()?.join("exports"),
    };
    let report = ResultsReport::new(sync.session(), training_results.as_ref(), recorder.history());
    info!(
        "Final loss: {} | Training time: {} | Relative error: {}",
        report.summary.final_loss, report.summary.training_time, report.summary.relative_error
    );
    report.write_to_dir(&export_dir).await?;

    drop(sync);
    logger.abort();
    Ok(())
}
