/// Retraining run sequencing and the collaborator seams it drives.
///
/// Loading data, training and scoring belong to external tooling; this module
/// only fixes the order of the stages, the split strategy and preprocessing
/// handed to them, and what happens to production afterwards.
mod cancel;
mod run;

pub use cancel::CancellationToken;
pub use run::{RetrainingOrchestrator, RunReport};

use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::eval::EvaluationReport;
use crate::types::{ModelArtifact, ModelCandidate, ModelMetrics, TrainingMetadata};

/// Handle to a labeled tabular dataset owned by a `DatasetSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledDataset {
    /// Path or URI the source understands.
    pub location: String,
    pub target_column: String,
    pub rows: u64,
    /// Rows whose target is churn.
    pub positive_rows: u64,
}

/// How a dataset is cut into train and test parts. Fixed for reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitStrategy {
    pub test_fraction: f64,
    pub seed: u64,
    /// Keep the churn ratio equal in both parts.
    pub stratify: bool,
}

impl Default for SplitStrategy {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: true,
        }
    }
}

impl SplitStrategy {
    pub fn validate(&self) -> Vec<String> {
        if self.test_fraction > 0.0 && self.test_fraction < 1.0 {
            Vec::new()
        } else {
            vec![format!(
                "split.test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub train: LabeledDataset,
    pub test: LabeledDataset,
    pub strategy: SplitStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Imputation {
    Median,
    MostFrequent,
}

/// Feature preprocessing every candidate must be trained with.
///
/// The default is the production pipeline: numeric columns median-imputed and
/// standard-scaled, categorical columns mode-imputed and one-hot encoded with
/// unseen categories ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingSpec {
    pub numeric_imputation: Imputation,
    pub scale_numeric: bool,
    pub categorical_imputation: Imputation,
    pub ignore_unknown_categories: bool,
    /// Columns dropped before training, e.g. customer ids.
    pub drop_columns: Vec<String>,
}

impl Default for PreprocessingSpec {
    fn default() -> Self {
        Self {
            numeric_imputation: Imputation::Median,
            scale_numeric: true,
            categorical_imputation: Imputation::MostFrequent,
            ignore_unknown_categories: true,
            drop_columns: vec!["customerID".to_string()],
        }
    }
}

/// A candidate produced by a `Trainer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_id: String,
    pub artifact: ModelArtifact,
    pub metadata: TrainingMetadata,
}

impl TrainedModel {
    pub fn candidate(&self, metrics: ModelMetrics) -> ModelCandidate {
        ModelCandidate {
            model_id: self.model_id.clone(),
            artifact: self.artifact.clone(),
            metrics,
        }
    }
}

/// Supplies the latest labeled data and splits it.
pub trait DatasetSource: Send + Sync {
    fn load(&self) -> std::result::Result<LabeledDataset, CollaboratorError>;

    fn split(
        &self,
        dataset: &LabeledDataset,
        strategy: &SplitStrategy,
    ) -> std::result::Result<DatasetSplit, CollaboratorError>;
}

/// Fits a candidate on the training part.
pub trait Trainer: Send + Sync {
    fn train(
        &self,
        train: &LabeledDataset,
        preprocessing: &PreprocessingSpec,
    ) -> std::result::Result<TrainedModel, CollaboratorError>;
}

/// Scores a candidate on the held-out part.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        model: &TrainedModel,
        test: &LabeledDataset,
    ) -> std::result::Result<EvaluationReport, CollaboratorError>;
}
