use crate::types::RetrainingStage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChurnOpsError>;

/// Failure raised by an external collaborator (dataset source, trainer, evaluator).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ChurnOpsError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    InvalidMetrics(#[from] InvalidMetrics),

    #[error("No production model registered")]
    NoProductionModel,

    #[error("Production model already registered at version {version}")]
    AlreadyBootstrapped { version: u64 },

    #[error("Production model changed during the run: expected v{expected}, found v{actual}")]
    StaleProductionVersion { expected: u64, actual: u64 },

    #[error("Model version not found: v{0}")]
    VersionNotFound(u64),

    #[error("Retraining failed at {stage}: {source}")]
    RetrainingFailed {
        stage: RetrainingStage,
        #[source]
        source: CollaboratorError,
    },

    #[error("Retraining cancelled before {stage}")]
    Cancelled { stage: RetrainingStage },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ChurnOpsError {
    /// Stage at which a retraining run stopped, if this error ended one.
    pub fn stage(&self) -> Option<RetrainingStage> {
        match self {
            Self::RetrainingFailed { stage, .. } | Self::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }
}

/// Which side of a comparison a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsRole {
    Current,
    Candidate,
}

impl std::fmt::Display for MetricsRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsRole::Current => write!(f, "current"),
            MetricsRole::Candidate => write!(f, "candidate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    RocAuc,
    RecallChurn,
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricName::RocAuc => write!(f, "roc_auc"),
            MetricName::RecallChurn => write!(f, "recall_churn"),
        }
    }
}

/// A metric value the promotion rule refuses to compare.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidMetrics {
    #[error("{role} {metric} is missing")]
    Missing { role: MetricsRole, metric: MetricName },

    #[error("{role} {metric} is NaN")]
    NotANumber { role: MetricsRole, metric: MetricName },

    #[error("{role} {metric} = {value} is outside [0, 1]")]
    OutOfRange {
        role: MetricsRole,
        metric: MetricName,
        #[serde(with = "crate::types::non_finite_as_null")]
        value: f64,
    },
}
