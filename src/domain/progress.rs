//! Training progress snapshot as reported by the training service
//!
//! The service is not strict about its payload: fields go missing between
//! releases, losses come back as `null` while a step is still being computed,
//! and the status string has had more than one spelling. Decoding is therefore
//! lenient field by field so that one bad value never costs us the rest of the
//! snapshot.

use serde::{Deserialize, Deserializer, Serialize};

/// Overall state of a training session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    /// Training is still running (also used for unknown or missing status)
    #[default]
    InProgress,
    /// Training finished; this is the terminal snapshot
    Completed,
}

impl TrainingStatus {
    fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "done" => Self::Completed,
            _ => Self::InProgress,
        }
    }

    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl<'de> Deserialize<'de> for TrainingStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Self::from_wire).unwrap_or_default())
    }
}

/// One poll response describing training progress at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub current_epoch: Option<u64>,
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub total_epochs: Option<u64>,
    #[serde(default)]
    pub status: TrainingStatus,
    #[serde(default, deserialize_with = "lenient_float")]
    pub total_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub physics_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub boundary_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub initial_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub convergence_rate: Option<f64>,
}

/// The four loss components pushed together as one chart point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossComponents {
    pub total: f64,
    pub physics: f64,
    pub boundary: f64,
    pub initial: f64,
}

impl LossComponents {
    pub const SERIES_NAMES: [&'static str; 4] =
        ["Total Loss", "Physics Loss", "Boundary Loss", "Initial Loss"];

    pub const fn as_array(&self) -> [f64; 4] {
        [self.total, self.physics, self.boundary, self.initial]
    }
}

impl ProgressSnapshot {
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// `round(100 * current / total)` clamped to `[0, 100]`.
    ///
    /// `None` when either epoch count is missing or `total_epochs` is zero.
    pub fn percentage(&self) -> Option<u8> {
        let current = self.current_epoch?;
        let total = self.total_epochs.filter(|t| *t > 0)?;
        #[allow(clippy::cast_precision_loss)]
        let pct = (100.0 * current as f64 / total as f64).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pct = pct.clamp(0.0, 100.0) as u8;
        Some(pct)
    }

    /// All four losses, or `None` if any of them is missing
    pub fn losses(&self) -> Option<LossComponents> {
        Some(LossComponents {
            total: self.total_loss?,
            physics: self.physics_loss?,
            boundary: self.boundary_loss?,
            initial: self.initial_loss?,
        })
    }
}

fn lenient_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|f| f.is_finite()))
}

fn lenient_epoch<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            // Some trainers serialize epochs as floats (e.g. 10.0)
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let epoch = f as u64;
                    epoch
                })
        }),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_snapshot_decodes() {
        let snapshot: ProgressSnapshot = serde_json::from_value(json!({
            "current_epoch": 10,
            "total_epochs": 100,
            "status": "in_progress",
            "total_loss": 0.05,
            "physics_loss": 0.02,
            "boundary_loss": 0.02,
            "initial_loss": 0.01,
            "convergence_rate": 0.9
        }))
        .unwrap();

        assert_eq!(snapshot.current_epoch, Some(10));
        assert_eq!(snapshot.total_epochs, Some(100));
        assert!(!snapshot.is_completed());
        assert_eq!(snapshot.percentage(), Some(10));
        assert_eq!(
            snapshot.losses(),
            Some(LossComponents { total: 0.05, physics: 0.02, boundary: 0.02, initial: 0.01 })
        );
        assert_eq!(snapshot.convergence_rate, Some(0.9));
    }

    #[test]
    fn test_missing_and_bad_fields_decode_as_absent() {
        let snapshot: ProgressSnapshot = serde_json::from_value(json!({
            "current_epoch": 3,
            "status": "completed",
            "total_loss": null,
            "physics_loss": "not a number",
            "boundary_loss": 0.5
        }))
        .unwrap();

        assert!(snapshot.is_completed());
        assert_eq!(snapshot.total_epochs, None);
        assert_eq!(snapshot.percentage(), None);
        assert_eq!(snapshot.total_loss, None);
        assert_eq!(snapshot.physics_loss, None);
        assert_eq!(snapshot.boundary_loss, Some(0.5));
        assert!(snapshot.losses().is_none());
    }

    #[test]
    fn test_unknown_status_is_in_progress() {
        let snapshot: ProgressSnapshot =
            serde_json::from_value(json!({ "status": "warming_up" })).unwrap();
        assert_eq!(snapshot.status, TrainingStatus::InProgress);

        let snapshot: ProgressSnapshot = serde_json::from_value(json!({ "status": 7 })).unwrap();
        assert_eq!(snapshot.status, TrainingStatus::InProgress);
    }

    #[test]
    fn test_float_epochs_are_accepted() {
        let snapshot: ProgressSnapshot =
            serde_json::from_value(json!({ "current_epoch": 12.0, "total_epochs": "40" })).unwrap();
        assert_eq!(snapshot.current_epoch, Some(12));
        assert_eq!(snapshot.total_epochs, Some(40));
        assert_eq!(snapshot.percentage(), Some(30));
    }

    #[test]
    fn test_percentage_is_clamped_and_guarded() {
        let over = ProgressSnapshot {
            current_epoch: Some(150),
            total_epochs: Some(100),
            ..Default::default()
        };
        assert_eq!(over.percentage(), Some(100));

        let zero_total = ProgressSnapshot {
            current_epoch: Some(1),
            total_epochs: Some(0),
            ..Default::default()
        };
        assert_eq!(zero_total.percentage(), None);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let snapshot = ProgressSnapshot {
            current_epoch: Some(1),
            total_epochs: Some(8),
            ..Default::default()
        };
        // 12.5 -> 13
        assert_eq!(snapshot.percentage(), Some(13));
    }
}
