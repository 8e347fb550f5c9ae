/// Retraining trigger evaluation.
///
/// A `TriggerEvaluator` looks at the signals produced by monitoring jobs and
/// answers one question: should a retraining run start now? Every trigger is
/// evaluated independently and the outcome carries the full set that fired,
/// so the run log shows every reason, not just the first one.
mod collect;

pub use collect::{SignalCollector, SignalPaths};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Recent churn recall strictly below this fires `PerformanceDegradation`.
    pub recall_floor: f64,
    /// Absolute shift in predicted churn rate that fires `PredictionShift`.
    pub churn_rate_delta: f64,
    /// Share of drifted columns at or above which the drift summary counts as drift.
    pub drift_share_threshold: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            recall_floor: 0.70,
            churn_rate_delta: 0.15,
            drift_share_threshold: 0.30,
        }
    }
}

impl TriggerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("trigger.recall_floor", self.recall_floor),
            ("trigger.churn_rate_delta", self.churn_rate_delta),
            ("trigger.drift_share_threshold", self.drift_share_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be in [0, 1], got {}", name, value));
            }
        }
        errors
    }
}

// ── Signals and outcome ───────────────────────────────────────────────────────

/// Predicted churn rate of production traffic against its training-time baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionShift {
    pub baseline_rate: f64,
    pub latest_rate: f64,
}

impl PredictionShift {
    pub fn delta(&self) -> f64 {
        (self.latest_rate - self.baseline_rate).abs()
    }
}

/// Inputs to a trigger evaluation. `None` means "not evaluated", never failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrainingSignals {
    pub new_data_available: bool,
    pub recent_recall: Option<f64>,
    pub drift_detected: Option<bool>,
    pub manual_request: bool,
    pub prediction_shift: Option<PredictionShift>,
}

impl RetrainingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_new_data(mut self, available: bool) -> Self {
        self.new_data_available = available;
        self
    }

    pub fn with_recent_recall(mut self, recall: f64) -> Self {
        self.recent_recall = Some(recall);
        self
    }

    pub fn with_drift(mut self, detected: bool) -> Self {
        self.drift_detected = Some(detected);
        self
    }

    pub fn with_manual_request(mut self, requested: bool) -> Self {
        self.manual_request = requested;
        self
    }

    pub fn with_prediction_shift(mut self, baseline_rate: f64, latest_rate: f64) -> Self {
        self.prediction_shift = Some(PredictionShift { baseline_rate, latest_rate });
        self
    }
}

/// Why a retraining run should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainingTrigger {
    NewLabeledData,
    PerformanceDegradation,
    DataDrift,
    ManualRequest,
    PredictionShift,
}

impl RetrainingTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewLabeledData => "new_labeled_data",
            Self::PerformanceDegradation => "performance_degradation",
            Self::DataDrift => "data_drift",
            Self::ManualRequest => "manual_request",
            Self::PredictionShift => "prediction_shift",
        }
    }
}

impl std::fmt::Display for RetrainingTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub retrain: bool,
    pub triggers: BTreeSet<RetrainingTrigger>,
    /// One human-readable line per fired trigger, or `no_trigger_matched`.
    pub reasons: Vec<String>,
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TriggerEvaluator {
    config: TriggerConfig,
}

impl TriggerEvaluator {
    pub fn new(config: TriggerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Evaluate every trigger against `signals`. Pure; absent inputs never fire.
    pub fn should_retrain(&self, signals: &RetrainingSignals) -> TriggerOutcome {
        let mut triggers = BTreeSet::new();
        let mut reasons = Vec::new();

        if signals.manual_request {
            triggers.insert(RetrainingTrigger::ManualRequest);
            reasons.push("manual_request: retraining forced by operator".to_string());
        }

        if signals.new_data_available {
            triggers.insert(RetrainingTrigger::NewLabeledData);
            reasons.push("new_data_detected: labeled data waiting to be trained on".to_string());
        }

        if signals.drift_detected == Some(true) {
            triggers.insert(RetrainingTrigger::DataDrift);
            reasons.push("data_drift: drift detector flagged the latest batch".to_string());
        }

        // NaN compares false, so an undefined recall never fires.
        if let Some(recall) = signals.recent_recall {
            if recall < self.config.recall_floor {
                triggers.insert(RetrainingTrigger::PerformanceDegradation);
                reasons.push(format!(
                    "performance_degradation: recall_churn={:.2} < {:.2}",
                    recall, self.config.recall_floor
                ));
            }
        }

        if let Some(shift) = signals.prediction_shift {
            let delta = shift.delta();
            if delta >= self.config.churn_rate_delta {
                triggers.insert(RetrainingTrigger::PredictionShift);
                reasons.push(format!(
                    "metric_shift: |predicted_churn_rate - baseline| = {:.2} >= {:.2}",
                    delta, self.config.churn_rate_delta
                ));
            }
        }

        if triggers.is_empty() {
            reasons.push("no_trigger_matched".to_string());
        }

        TriggerOutcome {
            retrain: !triggers.is_empty(),
            triggers,
            reasons,
        }
    }
}
