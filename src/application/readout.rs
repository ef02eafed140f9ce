//! Textual progress readouts
//!
//! Mirrors what the live-training page shows next to its charts: a
//! percentage line, the four loss values, a status line and the gauge.

use serde::{Deserialize, Serialize};

use crate::domain::constants::{GAUGE_DELTA_OFFSET, STATUS_TEXT_COMPLETED, STATUS_TEXT_IN_PROGRESS};
use crate::domain::progress::ProgressSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReadout {
    pub percentage: Option<u8>,
    /// `"{pct}% Epoch {current} / {total}"`
    pub progress_text: Option<String>,
    pub total_loss: Option<String>,
    pub physics_loss: Option<String>,
    pub boundary_loss: Option<String>,
    pub initial_loss: Option<String>,
    pub status_text: String,
    pub completed: bool,
    /// Gauge value, always within `[0, 100]`
    pub gauge_value: f64,
    /// Delta reference drawn under the gauge
    pub gauge_reference: f64,
}

impl Default for ProgressReadout {
    fn default() -> Self {
        Self {
            percentage: None,
            progress_text: None,
            total_loss: None,
            physics_loss: None,
            boundary_loss: None,
            initial_loss: None,
            status_text: STATUS_TEXT_IN_PROGRESS.to_string(),
            completed: false,
            gauge_value: 0.0,
            gauge_reference: 0.0,
        }
    }
}

impl ProgressReadout {
    /// Merge a snapshot into the readout.
    ///
    /// Fields missing from the snapshot keep their previous value.
    pub fn update(&mut self, snapshot: &ProgressSnapshot) {
        if let Some(pct) = snapshot.percentage() {
            self.percentage = Some(pct);
            if let (Some(current), Some(total)) = (snapshot.current_epoch, snapshot.total_epochs) {
                self.progress_text = Some(format!("{pct}% Epoch {current} / {total}"));
            }
            self.gauge_value = f64::from(pct).clamp(0.0, 100.0);
            self.gauge_reference = (self.gauge_value - GAUGE_DELTA_OFFSET).max(0.0);
        }

        if let Some(v) = snapshot.total_loss {
            self.total_loss = Some(format_loss(v));
        }
        if let Some(v) = snapshot.physics_loss {
            self.physics_loss = Some(format_loss(v));
        }
        if let Some(v) = snapshot.boundary_loss {
            self.boundary_loss = Some(format_loss(v));
        }
        if let Some(v) = snapshot.initial_loss {
            self.initial_loss = Some(format_loss(v));
        }

        self.completed = snapshot.is_completed();
        self.status_text = if self.completed {
            STATUS_TEXT_COMPLETED
        } else {
            STATUS_TEXT_IN_PROGRESS
        }
        .to_string();
    }
}

/// Scientific notation with three fractional digits, e.g. `5.000e-2`
pub fn format_loss(value: f64) -> String {
    format!("{value:.3e}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::TrainingStatus;

    fn snapshot(epoch: u64, total: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            current_epoch: Some(epoch),
            total_epochs: Some(total),
            status: TrainingStatus::InProgress,
            total_loss: Some(0.05),
            physics_loss: Some(0.02),
            boundary_loss: Some(0.02),
            initial_loss: Some(0.01),
            convergence_rate: None,
        }
    }

    #[test]
    fn test_readout_from_full_snapshot() {
        let mut readout = ProgressReadout::default();
        readout.update(&snapshot(10, 100));

        assert_eq!(readout.percentage, Some(10));
        assert_eq!(readout.progress_text.as_deref(), Some("10% Epoch 10 / 100"));
        assert_eq!(readout.total_loss.as_deref(), Some("5.000e-2"));
        assert_eq!(readout.initial_loss.as_deref(), Some("1.000e-2"));
        assert_eq!(readout.status_text, "Training in Progress...");
        assert!((readout.gauge_value - 10.0).abs() < f64::EPSILON);
        assert!((readout.gauge_reference - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_fields_keep_previous_values() {
        let mut readout = ProgressReadout::default();
        readout.update(&snapshot(10, 100));

        let partial = ProgressSnapshot {
            current_epoch: Some(20),
            total_epochs: None,
            total_loss: Some(0.04),
            status: TrainingStatus::Completed,
            ..Default::default()
        };
        readout.update(&partial);

        assert_eq!(readout.percentage, Some(10));
        assert_eq!(readout.progress_text.as_deref(), Some("10% Epoch 10 / 100"));
        assert_eq!(readout.total_loss.as_deref(), Some("4.000e-2"));
        assert_eq!(readout.physics_loss.as_deref(), Some("2.000e-2"));
        assert_eq!(readout.status_text, "Training Completed");
        assert!(readout.completed);
    }

    #[test]
    fn test_gauge_reference_never_negative() {
        let mut readout = ProgressReadout::default();
        readout.update(&snapshot(2, 100));
        assert!((readout.gauge_reference - 0.0).abs() < f64::EPSILON);
    }
}
