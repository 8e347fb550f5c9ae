pub mod types;
pub mod error;
pub mod eval;
pub mod trigger;
pub mod promotion;
pub mod registry;
pub mod tracking;
pub mod orchestrator;

pub use error::{ChurnOpsError, CollaboratorError, InvalidMetrics, MetricName, MetricsRole, Result};
pub use types::*;
pub use eval::{
    confusion_at, evaluate, roc_auc, ConfusionMatrix, EvaluationReport, RiskLevel,
    ScoredSample, ScoringConfig,
};
pub use trigger::{
    PredictionShift, RetrainingSignals, RetrainingTrigger, SignalCollector, SignalPaths,
    TriggerConfig, TriggerEvaluator, TriggerOutcome,
};
pub use promotion::{
    rule_holds, KeepReason, PromotionDecider, PromotionDecision, PromotionOutcome,
    PromotionPolicy, RULE_VERSION,
};
pub use registry::{ModelRegistry, RedbRegistry, CURRENT_SCHEMA_VERSION};
pub use tracking::{TrackingEntry, TrackingEvent, TrackingFilter, TrackingLog, TrackingSink};
pub use orchestrator::{
    CancellationToken, DatasetSource, DatasetSplit, Evaluator, LabeledDataset,
    PreprocessingSpec, RetrainingOrchestrator, RunReport, SplitStrategy,
    TrainedModel, Trainer,
};
