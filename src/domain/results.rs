//! Final training results returned once a session has completed

use serde::{Deserialize, Serialize};

use crate::domain::constants::NOT_AVAILABLE;

/// Error metrics computed by the training service against the reference solution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    #[serde(default)]
    pub l2_error: Option<f64>,
    #[serde(default)]
    pub linf_error: Option<f64>,
    /// Fraction, rendered as a percentage
    #[serde(default)]
    pub relative_error: Option<f64>,
    #[serde(default)]
    pub convergence_rate: Option<f64>,
}

/// Results payload; every field is optional because older trainers omit some
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingResults {
    #[serde(default)]
    pub final_loss: Option<f64>,
    /// Wall-clock training time in seconds
    #[serde(default)]
    pub training_time: Option<f64>,
    #[serde(default)]
    pub convergence_status: Option<String>,
    #[serde(default)]
    pub metrics: Option<ResultMetrics>,
}

/// Display strings for the results summary and metrics table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub final_loss: String,
    pub training_time: String,
    pub convergence_status: String,
    pub l2_error: String,
    pub linf_error: String,
    pub relative_error: String,
    pub convergence_rate: String,
}

impl ResultsSummary {
    pub fn from_results(results: &TrainingResults) -> Self {
        let metrics = results.metrics.clone().unwrap_or_default();
        Self {
            final_loss: fmt_or_na(results.final_loss, |v| format!("{v:.6}")),
            training_time: fmt_or_na(results.training_time, |v| format!("{v:.2}s")),
            convergence_status: results
                .convergence_status
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            l2_error: fmt_or_na(metrics.l2_error, |v| format!("{v:.6}")),
            linf_error: fmt_or_na(metrics.linf_error, |v| format!("{v:.6}")),
            relative_error: fmt_or_na(metrics.relative_error, |v| format!("{:.2}%", v * 100.0)),
            convergence_rate: fmt_or_na(metrics.convergence_rate, |v| format!("{v:.4}")),
        }
    }
}

fn fmt_or_na(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value
        .filter(|v| v.is_finite())
        .map_or_else(|| NOT_AVAILABLE.to_string(), fmt)
}
