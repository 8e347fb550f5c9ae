mod metrics;
mod scoring;

pub use metrics::{confusion_at, evaluate, roc_auc, ConfusionMatrix, EvaluationReport, ScoredSample};
pub use scoring::{RiskLevel, ScoringConfig, DEFAULT_BUSINESS_THRESHOLD};
