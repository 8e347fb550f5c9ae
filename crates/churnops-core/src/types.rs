use crate::error::{InvalidMetrics, MetricName, MetricsRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of one retraining run. UUIDv7 so ids sort by start time.
pub type RunId = Uuid;

pub fn new_run_id() -> RunId {
    Uuid::now_v7()
}

/// Evaluation metrics of one model on one test set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(with = "non_finite_as_null")]
    pub roc_auc: f64,
    #[serde(with = "non_finite_as_null")]
    pub recall_churn: f64,
}

impl ModelMetrics {
    pub fn new(roc_auc: f64, recall_churn: f64) -> Self {
        Self { roc_auc, recall_churn }
    }

    /// Build from values that may be absent, e.g. a metrics file with a missing key.
    pub fn from_parts(
        role: MetricsRole,
        roc_auc: Option<f64>,
        recall_churn: Option<f64>,
    ) -> std::result::Result<Self, InvalidMetrics> {
        let roc_auc = roc_auc.ok_or(InvalidMetrics::Missing { role, metric: MetricName::RocAuc })?;
        let recall_churn = recall_churn.ok_or(InvalidMetrics::Missing {
            role,
            metric: MetricName::RecallChurn,
        })?;
        Ok(Self { roc_auc, recall_churn })
    }

    /// Both values must be real numbers in `[0, 1]`.
    pub fn validate(&self, role: MetricsRole) -> std::result::Result<(), InvalidMetrics> {
        check_unit(role, MetricName::RocAuc, self.roc_auc)?;
        check_unit(role, MetricName::RecallChurn, self.recall_churn)
    }
}

fn check_unit(role: MetricsRole, metric: MetricName, value: f64) -> std::result::Result<(), InvalidMetrics> {
    if value.is_nan() {
        return Err(InvalidMetrics::NotANumber { role, metric });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(InvalidMetrics::OutOfRange { role, metric, value });
    }
    Ok(())
}

/// Serde helper writing NaN/inf as `null` and reading `null` back as NaN.
///
/// JSON has no NaN literal, and the registry and tracking log must both be able
/// to round-trip a metric that failed validation.
pub(crate) mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Reference to a model artifact stored outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Path or URI of the serialized pipeline.
    pub uri: String,
    /// Hex SHA-256 of the artifact bytes, when the producer computed one.
    pub sha256: Option<String>,
}

impl ModelArtifact {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), sha256: None }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }
}

/// A trained model offered to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub model_id: String,
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
}

/// How a production record came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordChange {
    Bootstrap,
    Promotion,
    Rollback { from_version: u64, to_version: u64 },
}

impl std::fmt::Display for RecordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordChange::Bootstrap => write!(f, "bootstrap"),
            RecordChange::Promotion => write!(f, "promotion"),
            RecordChange::Rollback { from_version, to_version } => {
                write!(f, "rollback v{} -> v{}", from_version, to_version)
            }
        }
    }
}

/// One version of the production model. Exactly one version is current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionModelRecord {
    pub version: u64,
    pub model_id: String,
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
    pub recorded_at: DateTime<Utc>,
    /// Retraining run that produced this version, if any.
    pub run_id: Option<RunId>,
    pub change: RecordChange,
}

impl ProductionModelRecord {
    pub fn from_candidate(
        version: u64,
        candidate: &ModelCandidate,
        run_id: Option<RunId>,
        change: RecordChange,
    ) -> Self {
        Self {
            version,
            model_id: candidate.model_id.clone(),
            artifact: candidate.artifact.clone(),
            metrics: candidate.metrics,
            recorded_at: Utc::now(),
            run_id,
            change,
        }
    }

    pub fn as_candidate(&self) -> ModelCandidate {
        ModelCandidate {
            model_id: self.model_id.clone(),
            artifact: self.artifact.clone(),
            metrics: self.metrics,
        }
    }
}

/// Free-form key/value metadata reported by a trainer (hyper-parameters, library versions).
pub type TrainingMetadata = BTreeMap<String, String>;

/// Stages of a retraining run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainingStage {
    DatasetLoad,
    Split,
    Train,
    Evaluate,
    Decide,
    Promote,
}

impl std::fmt::Display for RetrainingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrainingStage::DatasetLoad => write!(f, "dataset_load"),
            RetrainingStage::Split => write!(f, "split"),
            RetrainingStage::Train => write!(f, "train"),
            RetrainingStage::Evaluate => write!(f, "evaluate"),
            RetrainingStage::Decide => write!(f, "decide"),
            RetrainingStage::Promote => write!(f, "promote"),
        }
    }
}
