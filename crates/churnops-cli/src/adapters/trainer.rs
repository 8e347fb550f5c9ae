use churnops_core::{
    CollaboratorError, LabeledDataset, ModelArtifact, PreprocessingSpec, SplitStrategy,
    TrainedModel, Trainer, TrainingMetadata,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::evaluator::PREDICTIONS_FILE;
use super::{run_command, AdapterError};

/// Manifest the training command leaves in its output directory.
#[derive(Debug, Deserialize)]
struct TrainingManifest {
    model_id: Option<String>,
    /// Artifact path, relative to the output directory unless absolute.
    artifact: PathBuf,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

pub const MANIFEST_FILE: &str = "training.json";

/// Trains by running an external program, e.g. the scikit-learn pipeline script.
///
/// The program receives its inputs through `CHURNOPS_*` environment variables
/// and must write `training.json` into `CHURNOPS_OUTPUT_DIR`.
pub struct CommandTrainer {
    command: Vec<String>,
    output_dir: PathBuf,
    split: SplitStrategy,
    model_id_prefix: String,
    test_path: Option<PathBuf>,
}

impl CommandTrainer {
    pub fn new(command: Vec<String>, output_dir: impl Into<PathBuf>, split: SplitStrategy) -> Self {
        Self {
            command,
            output_dir: output_dir.into(),
            split,
            model_id_prefix: "candidate".to_string(),
            test_path: None,
        }
    }

    /// Let the command score the test split itself, leaving `predictions.csv`
    /// in the output directory for `PredictionsEvaluator`.
    pub fn with_test_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_path = Some(path.into());
        self
    }

    fn default_model_id(&self) -> String {
        let run = self
            .output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());
        format!("{}-{}", self.model_id_prefix, run)
    }

    fn read_manifest(&self) -> Result<TrainingManifest, AdapterError> {
        let path = self.output_dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| AdapterError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|source| AdapterError::Json {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Trainer for CommandTrainer {
    fn train(&self, train: &LabeledDataset, preprocessing: &PreprocessingSpec) -> Result<TrainedModel, CollaboratorError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| AdapterError::io(&self.output_dir, e))?;
        let mut envs = vec![
            ("CHURNOPS_TRAIN_PATH", train.location.clone()),
            ("CHURNOPS_TARGET_COLUMN", train.target_column.clone()),
            ("CHURNOPS_OUTPUT_DIR", self.output_dir.display().to_string()),
            ("CHURNOPS_SPLIT_SEED", self.split.seed.to_string()),
            ("CHURNOPS_PREPROCESSING", serde_json::to_string(preprocessing)?),
        ];
        if let Some(test) = &self.test_path {
            envs.push(("CHURNOPS_TEST_PATH", test.display().to_string()));
            envs.push((
                "CHURNOPS_PREDICTIONS_PATH",
                self.output_dir.join(PREDICTIONS_FILE).display().to_string(),
            ));
        }
        // Run from the invoking directory so project-relative commands resolve.
        run_command(&self.command, &envs, Path::new("."))?;

        let manifest = self.read_manifest()?;
        let artifact_path = if manifest.artifact.is_absolute() {
            manifest.artifact.clone()
        } else {
            self.output_dir.join(&manifest.artifact)
        };
        let digest = sha256_file(&artifact_path)?;

        let mut metadata: TrainingMetadata = manifest
            .params
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        metadata.insert("train_rows".to_string(), train.rows.to_string());

        let model_id = manifest.model_id.unwrap_or_else(|| self.default_model_id());
        tracing::info!("Trained {} -> {}", model_id, artifact_path.display());

        Ok(TrainedModel {
            model_id,
            artifact: ModelArtifact::new(artifact_path.display().to_string()).with_sha256(digest),
            metadata,
        })
    }
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String, AdapterError> {
    let mut file = std::fs::File::open(path).map_err(|e| AdapterError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| AdapterError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
