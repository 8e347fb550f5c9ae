use churnops_core::{evaluate, CollaboratorError, EvaluationReport, Evaluator, LabeledDataset, ScoredSample, TrainedModel};
use std::path::{Path, PathBuf};

use super::{parse_label, run_command, AdapterError};

pub const PREDICTIONS_FILE: &str = "predictions.csv";

/// Read `label,probability` rows written by the scoring program.
pub fn read_predictions(path: &Path) -> Result<Vec<ScoredSample>, AdapterError> {
    let path_str = path.display().to_string();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| AdapterError::MissingColumn {
            path: path_str.clone(),
            column: name.to_string(),
        })
    };
    let label_idx = column("label")?;
    let prob_idx = column("probability")?;

    let mut samples = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i as u64 + 1;
        let raw_label = record.get(label_idx).unwrap_or("");
        let churned = parse_label(raw_label).ok_or_else(|| AdapterError::BadLabel {
            path: path_str.clone(),
            row,
            value: raw_label.to_string(),
        })?;
        let raw_prob = record.get(prob_idx).unwrap_or("");
        let probability = raw_prob
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| (0.0..=1.0).contains(p))
            .ok_or_else(|| AdapterError::BadProbability {
                path: path_str.clone(),
                row,
                value: raw_prob.to_string(),
            })?;
        samples.push(ScoredSample::new(churned, probability));
    }
    if samples.is_empty() {
        return Err(AdapterError::Empty(path_str));
    }
    Ok(samples)
}

/// Evaluates a candidate from the predictions it made on the test split.
///
/// With a predict command configured the command is run first; otherwise the
/// training program is expected to have left `predictions.csv` behind.
pub struct PredictionsEvaluator {
    predict_command: Vec<String>,
    work_dir: PathBuf,
    threshold: f64,
}

impl PredictionsEvaluator {
    pub fn new(predict_command: Vec<String>, work_dir: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            predict_command,
            work_dir: work_dir.into(),
            threshold,
        }
    }

    fn predictions_path(&self) -> PathBuf {
        self.work_dir.join(PREDICTIONS_FILE)
    }
}

impl Evaluator for PredictionsEvaluator {
    fn evaluate(&self, model: &TrainedModel, test: &LabeledDataset) -> Result<EvaluationReport, CollaboratorError> {
        let predictions = self.predictions_path();
        if !self.predict_command.is_empty() {
            let envs = [
                ("CHURNOPS_MODEL_PATH", model.artifact.uri.clone()),
                ("CHURNOPS_TEST_PATH", test.location.clone()),
                ("CHURNOPS_TARGET_COLUMN", test.target_column.clone()),
                ("CHURNOPS_PREDICTIONS_PATH", predictions.display().to_string()),
            ];
            run_command(&self.predict_command, &envs, Path::new("."))?;
        }

        let samples = read_predictions(&predictions)?;
        if samples.len() as u64 != test.rows {
            tracing::warn!(
                "{} has {} predictions for {} test rows",
                predictions.display(),
                samples.len(),
                test.rows
            );
        }
        let report = evaluate(&samples, self.threshold);
        tracing::info!("Evaluated {}: {}", model.model_id, report.summary());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use churnops_core::ModelArtifact;
    use tempfile::TempDir;

    fn model() -> TrainedModel {
        TrainedModel {
            model_id: "candidate-test".into(),
            artifact: ModelArtifact::new("model.joblib"),
            metadata: Default::default(),
        }
    }

    fn test_split(dir: &Path, rows: u64) -> LabeledDataset {
        LabeledDataset {
            location: dir.join("test.csv").display().to_string(),
            target_column: "Churn".into(),
            rows,
            positive_rows: 2,
        }
    }

    #[test]
    fn reads_labels_and_probabilities() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREDICTIONS_FILE);
        std::fs::write(&path, "label,probability\nYes,0.9\n0,0.1\n").unwrap();
        let samples = read_predictions(&path).unwrap();
        assert_eq!(samples, vec![ScoredSample::new(true, 0.9), ScoredSample::new(false, 0.1)]);
    }

    #[test]
    fn rejects_probability_outside_unit_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREDICTIONS_FILE);
        std::fs::write(&path, "label,probability\n1,0.2\n0,1.7\n").unwrap();
        let err = read_predictions(&path).unwrap_err();
        assert!(matches!(err, AdapterError::BadProbability { row: 2, .. }));
    }

    #[test]
    fn evaluates_existing_predictions_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PREDICTIONS_FILE),
            "label,probability\n1,0.95\n1,0.35\n0,0.45\n0,0.05\n",
        )
        .unwrap();
        let evaluator = PredictionsEvaluator::new(Vec::new(), dir.path(), 0.40);
        let report = evaluator.evaluate(&model(), &test_split(dir.path(), 4)).unwrap();

        assert_eq!(report.samples, 4);
        assert_eq!(report.confusion.true_positive, 1);
        assert_eq!(report.confusion.false_negative, 1);
        assert_eq!(report.confusion.false_positive, 1);
        assert_eq!(report.metrics.recall_churn, 0.5);
        // 3 of the 4 positive/negative pairs are ordered correctly.
        assert_eq!(report.metrics.roc_auc, 0.75);
    }

    #[cfg(unix)]
    #[test]
    fn runs_predict_command_first() {
        let dir = TempDir::new().unwrap();
        let script = r#"printf 'label,probability\n1,0.8\n0,0.2\n' > "$CHURNOPS_PREDICTIONS_PATH""#;
        let evaluator = PredictionsEvaluator::new(
            vec!["sh".into(), "-c".into(), script.into()],
            dir.path(),
            0.40,
        );
        let report = evaluator.evaluate(&model(), &test_split(dir.path(), 2)).unwrap();
        assert_eq!(report.metrics.roc_auc, 1.0);
        assert_eq!(report.metrics.recall_churn, 1.0);
    }

    #[test]
    fn missing_predictions_is_an_error() {
        let dir = TempDir::new().unwrap();
        let evaluator = PredictionsEvaluator::new(Vec::new(), dir.path(), 0.40);
        assert!(evaluator.evaluate(&model(), &test_split(dir.path(), 2)).is_err());
    }
}
