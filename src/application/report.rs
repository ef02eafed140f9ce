//! Results report: final results + recorded chart history, exported as JSON

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::results::{ResultMetrics, ResultsSummary, TrainingResults};
use crate::domain::session::SessionKey;

/// One exported chart series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesHistory {
    pub name: String,
    /// `(epoch, value)` pairs in append order
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    pub purpose: String,
    pub equation: String,
    pub timestamp: DateTime<Utc>,
    pub summary: ResultsSummary,
    /// Raw metrics as returned by the service, when results were available
    pub metrics: Option<ResultMetrics>,
    pub history: Vec<SeriesHistory>,
}

impl ResultsReport {
    pub fn new(
        key: &SessionKey,
        results: Option<&TrainingResults>,
        history: Vec<SeriesHistory>,
    ) -> Self {
        let empty = TrainingResults::default();
        let results = results.unwrap_or(&empty);
        Self {
            purpose: key.purpose.clone(),
            equation: key.equation_type.clone(),
            timestamp: Utc::now(),
            summary: ResultsSummary::from_results(results),
            metrics: results.metrics.clone(),
            history,
        }
    }

    /// `{purpose}_{equation}_results_{YYYY-MM-DD}.json`
    ///
    /// Session parts are reduced to a single safe path component.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_results_{}.json",
            file_name_component(&self.purpose),
            file_name_component(&self.equation),
            self.timestamp.format("%Y-%m-%d")
        )
    }

    /// Write the report as pretty JSON into `dir`, returning the file path
    pub async fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

        let path = dir.join(self.file_name());
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize results report")?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write results report: {}", path.display()))?;

        info!("💾 Saved results report to: {}", path.display());
        Ok(path)
    }
}

fn file_name_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_without_results_uses_placeholders() {
        let key = SessionKey::new("forward_problems", "burgers");
        let report = ResultsReport::new(&key, None, vec![]);
        assert_eq!(report.summary.final_loss, "N/A");
        assert!(report.metrics.is_none());
        assert!(report.file_name().starts_with("forward_problems_burgers_results_"));
        assert!(report.file_name().ends_with(".json"));
    }

    #[tokio::test]
    async fn test_unsafe_session_parts_stay_inside_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let key = SessionKey::new("a/b", "../heat");
        let report = ResultsReport::new(&key, None, vec![]);

        let name = report.file_name();
        assert!(name.starts_with("a_b___heat_results_"), "{name}");
        assert!(!name.contains('/'));

        let path = report.write_to_dir(dir.path()).await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
        // The report keeps the original session parts
        let written: ResultsReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.purpose, "a/b");
    }

    #[tokio::test]
    async fn test_report_written_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let key = SessionKey::default();
        let results = TrainingResults {
            final_loss: Some(0.001),
            ..Default::default()
        };
        let history = vec![SeriesHistory {
            name: "Total Loss".into(),
            points: vec![(1.0, 0.5), (2.0, 0.25)],
        }];

        let report = ResultsReport::new(&key, Some(&results), history);
        let path = report.write_to_dir(&dir.path().join("exports")).await.unwrap();

        let written: ResultsReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.summary.final_loss, "0.001000");
        assert_eq!(written.history[0].points.len(), 2);
        assert_eq!(written.purpose, "forward_problems");
    }
}
