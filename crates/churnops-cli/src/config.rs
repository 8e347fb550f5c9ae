use anyhow::{Context, Result};
use churnops_core::{
    PreprocessingSpec, PromotionPolicy, ScoringConfig, SignalPaths, SplitStrategy, TriggerConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `churnops.toml`. Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnOpsConfig {
    /// Directory holding the registry database.
    pub data_dir: PathBuf,
    pub trigger: TriggerConfig,
    pub signals: SignalPaths,
    pub promotion: PromotionPolicy,
    pub split: SplitStrategy,
    pub preprocessing: PreprocessingSpec,
    pub scoring: ScoringConfig,
    pub training: TrainingConfig,
}

impl Default for ChurnOpsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            trigger: TriggerConfig::default(),
            signals: SignalPaths::default(),
            promotion: PromotionPolicy::default(),
            split: SplitStrategy::default(),
            preprocessing: PreprocessingSpec::default(),
            scoring: ScoringConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

/// How the external training tooling is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Labeled dataset, CSV with a header row.
    pub dataset: PathBuf,
    pub target_column: String,
    /// Program and arguments that fit a candidate. Must write `training.json`.
    pub train_command: Vec<String>,
    /// Program and arguments that score the test split. When empty the train
    /// command is expected to have written `predictions.csv` itself.
    pub predict_command: Vec<String>,
    /// Parent of the per-run working directories.
    pub runs_dir: PathBuf,
    /// Optional tuned threshold overriding `scoring.business_threshold`.
    pub threshold_file: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/processed/telco_churn.csv"),
            target_column: "Churn".to_string(),
            train_command: vec![
                "python".to_string(),
                "-m".to_string(),
                "src.retraining.train_candidate".to_string(),
            ],
            predict_command: Vec::new(),
            runs_dir: PathBuf::from("artifacts/runs"),
            threshold_file: PathBuf::from("models/threshold.json"),
        }
    }
}

impl ChurnOpsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load the file when present, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Collect every problem instead of stopping at the first one.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.trigger.validate());
        errors.extend(self.promotion.validate());
        errors.extend(self.split.validate());
        errors.extend(self.scoring.validate());
        if self.training.target_column.trim().is_empty() {
            errors.push("training.target_column must not be empty".into());
        }
        if self.training.train_command.is_empty() {
            errors.push("training.train_command must name a program".into());
        }
        errors
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("churnops.redb")
    }

    /// Scoring thresholds with the tuned threshold file applied.
    pub fn effective_scoring(&self) -> ScoringConfig {
        self.scoring.clone().with_threshold_file(&self.training.threshold_file)
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("creating {}", self.data_dir.display()))?;
        }
        Ok(())
    }
}
