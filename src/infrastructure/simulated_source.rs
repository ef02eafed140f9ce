//! Offline progress source
//!
//! Pretends to be a training run: every fetch advances the epoch by a fixed
//! step, losses decay exponentially and the run reports `completed` once the
//! epoch reaches `total_epochs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::FetchError;
use crate::domain::progress::{ProgressSnapshot, TrainingStatus};
use crate::domain::results::{ResultMetrics, TrainingResults};
use crate::domain::services::{ProgressSource, ResultsSource};
use crate::domain::session::SessionKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub total_epochs: u64,
    pub epoch_step: u64,
    /// Total loss at epoch 0
    pub initial_loss: f64,
    /// Exponential decay per epoch
    pub decay_rate: f64,
    /// Relative multiplicative noise, 0 disables it
    pub noise: f64,
    /// Seed for the noise generator
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_epochs: 1000,
            epoch_step: 10,
            initial_loss: 1.0,
            decay_rate: 0.005,
            noise: 0.0,
            seed: 42,
        }
    }
}

#[derive(Debug)]
pub struct SimulatedProgressSource {
    config: SimulationConfig,
    epoch: AtomicU64,
    rng: Mutex<fastrand::Rng>,
}

impl SimulatedProgressSource {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = fastrand::Rng::with_seed(config.seed);
        Self {
            config,
            epoch: AtomicU64::new(0),
            rng: Mutex::new(rng),
        }
    }

    pub fn with_epochs(total_epochs: u64, epoch_step: u64) -> Self {
        Self::new(SimulationConfig {
            total_epochs,
            epoch_step,
            ..SimulationConfig::default()
        })
    }

    /// Epoch reported by the most recent fetch
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn advance(&self) -> u64 {
        let step = self.config.epoch_step.max(1);
        let total = self.config.total_epochs;
        let previous = self
            .epoch
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |e| {
                Some(e.saturating_add(step).min(total))
            })
            .unwrap_or_else(|e| e);
        previous.saturating_add(step).min(total)
    }

    fn total_loss_at(&self, epoch: u64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let decayed = self.config.initial_loss * (-self.config.decay_rate * epoch as f64).exp();
        if self.config.noise <= 0.0 {
            return decayed;
        }
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let jitter = (rng.f64() * 2.0 - 1.0) * self.config.noise;
        decayed * (1.0 + jitter).max(0.0)
    }

    fn snapshot_at(&self, epoch: u64) -> ProgressSnapshot {
        let total_loss = self.total_loss_at(epoch);
        let status = if epoch >= self.config.total_epochs {
            TrainingStatus::Completed
        } else {
            TrainingStatus::InProgress
        };

        ProgressSnapshot {
            current_epoch: Some(epoch),
            total_epochs: Some(self.config.total_epochs),
            status,
            total_loss: Some(total_loss),
            physics_loss: Some(total_loss * 0.6),
            boundary_loss: Some(total_loss * 0.25),
            initial_loss: Some(total_loss * 0.15),
            convergence_rate: Some(1.0 - total_loss / self.config.initial_loss.max(f64::EPSILON)),
        }
    }
}

impl Default for SimulatedProgressSource {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl ProgressSource for SimulatedProgressSource {
    async fn fetch_progress(&self, _key: &SessionKey) -> Result<ProgressSnapshot, FetchError> {
        let epoch = self.advance();
        Ok(self.snapshot_at(epoch))
    }
}

#[async_trait]
impl ResultsSource for SimulatedProgressSource {
    async fn fetch_results(&self, _key: &SessionKey) -> Result<TrainingResults, FetchError> {
        let epoch = self.current_epoch();
        let snapshot = self.snapshot_at(epoch);
        let final_loss = snapshot.total_loss.unwrap_or_default();

        Ok(TrainingResults {
            final_loss: Some(final_loss),
            training_time: None,
            convergence_status: Some(if snapshot.is_completed() {
                "converged".to_string()
            } else {
                "running".to_string()
            }),
            metrics: Some(ResultMetrics {
                l2_error: Some(final_loss.sqrt()),
                linf_error: Some(final_loss.sqrt() * 2.0),
                relative_error: Some(final_loss / self.config.initial_loss.max(f64::EPSILON)),
                convergence_rate: snapshot.convergence_rate,
            }),
        })
    }
}
