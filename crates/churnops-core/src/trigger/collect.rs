use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{PredictionShift, RetrainingSignals, TriggerConfig};

/// Where monitoring jobs leave the files retraining signals are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalPaths {
    /// Drop directory for freshly labeled data. Any regular file counts.
    pub new_data_dir: PathBuf,
    /// Drift summary written by the drift job.
    pub drift_summary: PathBuf,
    /// Metrics captured when the production model was trained.
    pub baseline_metrics: PathBuf,
    /// Metrics of recent production traffic.
    pub latest_metrics: PathBuf,
}

impl Default for SignalPaths {
    fn default() -> Self {
        Self {
            new_data_dir: PathBuf::from("data/new"),
            drift_summary: PathBuf::from("monitoring/latest_drift_summary.json"),
            baseline_metrics: PathBuf::from("monitoring/baseline_metrics.json"),
            latest_metrics: PathBuf::from("monitoring/latest_prod_metrics.json"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DriftSummary {
    share_drifted_columns: Option<f64>,
    dataset_drift: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct MetricsSnapshot {
    predicted_churn_rate: Option<f64>,
    recall_churn: Option<f64>,
}

/// Reads monitoring outputs into `RetrainingSignals`.
///
/// Collection never fails: a missing or malformed file leaves its signal unset.
#[derive(Debug, Clone)]
pub struct SignalCollector {
    paths: SignalPaths,
    config: TriggerConfig,
}

impl SignalCollector {
    pub fn new(paths: SignalPaths, config: TriggerConfig) -> Self {
        Self { paths, config }
    }

    pub fn collect(&self, manual_request: bool) -> RetrainingSignals {
        let latest = read_json::<MetricsSnapshot>(&self.paths.latest_metrics);
        let baseline = read_json::<MetricsSnapshot>(&self.paths.baseline_metrics);

        let prediction_shift = match (
            baseline.as_ref().and_then(|b| b.predicted_churn_rate),
            latest.as_ref().and_then(|l| l.predicted_churn_rate),
        ) {
            (Some(baseline_rate), Some(latest_rate)) => Some(PredictionShift { baseline_rate, latest_rate }),
            _ => None,
        };

        RetrainingSignals {
            new_data_available: self.new_data_files() > 0,
            recent_recall: latest.as_ref().and_then(|l| l.recall_churn),
            drift_detected: self.drift_detected(),
            manual_request,
            prediction_shift,
        }
    }

    /// Number of regular files waiting in the new-data directory.
    pub fn new_data_files(&self) -> usize {
        let dir = &self.paths.new_data_dir;
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count(),
            Err(e) => {
                log::debug!("New-data directory {:?} not readable: {}", dir, e);
                0
            }
        }
    }

    fn drift_detected(&self) -> Option<bool> {
        let summary = read_json::<DriftSummary>(&self.paths.drift_summary)?;
        if let Some(flag) = summary.dataset_drift {
            return Some(flag);
        }
        summary
            .share_drifted_columns
            .map(|share| share >= self.config.drift_share_threshold)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    if !path.exists() {
        log::debug!("Signal file {:?} absent", path);
        return None;
    }
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("Failed to read {:?}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Ignoring malformed signal file {:?}: {}", path, e);
            None
        }
    }
}
