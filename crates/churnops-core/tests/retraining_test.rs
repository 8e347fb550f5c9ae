use churnops_core::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeSource {
    fail_load: bool,
    fail_split: bool,
}

impl DatasetSource for FakeSource {
    fn load(&self) -> std::result::Result<LabeledDataset, CollaboratorError> {
        if self.fail_load {
            return Err("dataset file missing".into());
        }
        Ok(LabeledDataset {
            location: "data/processed/telco.csv".into(),
            target_column: "Churn".into(),
            rows: 1000,
            positive_rows: 265,
        })
    }

    fn split(
        &self,
        dataset: &LabeledDataset,
        strategy: &SplitStrategy,
    ) -> std::result::Result<DatasetSplit, CollaboratorError> {
        if self.fail_split {
            return Err("only one class present, cannot stratify".into());
        }
        let test_rows = (dataset.rows as f64 * strategy.test_fraction) as u64;
        let part = |rows: u64, suffix: &str| LabeledDataset {
            location: format!("{}#{}", dataset.location, suffix),
            target_column: dataset.target_column.clone(),
            rows,
            positive_rows: 0,
        };
        Ok(DatasetSplit {
            train: part(dataset.rows - test_rows, "train"),
            test: part(test_rows, "test"),
            strategy: strategy.clone(),
        })
    }
}

struct FakeTrainer {
    model_id: String,
    fails: bool,
    seen_preprocessing: Mutex<Option<PreprocessingSpec>>,
    /// Runs while "training", to simulate work happening concurrently.
    during: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FakeTrainer {
    fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            fails: false,
            seen_preprocessing: Mutex::new(None),
            during: None,
        }
    }
}

impl Trainer for FakeTrainer {
    fn train(
        &self,
        _train: &LabeledDataset,
        preprocessing: &PreprocessingSpec,
    ) -> std::result::Result<TrainedModel, CollaboratorError> {
        *self.seen_preprocessing.lock().unwrap() = Some(preprocessing.clone());
        if let Some(f) = &self.during {
            f();
        }
        if self.fails {
            return Err("solver did not converge".into());
        }
        Ok(TrainedModel {
            model_id: self.model_id.clone(),
            artifact: ModelArtifact::new(format!("models/{}.joblib", self.model_id)),
            metadata: [("model_type".to_string(), "LogisticRegression".to_string())]
                .into_iter()
                .collect(),
        })
    }
}

enum FakeEvaluator {
    Metrics(ModelMetrics),
    Fails,
}

impl Evaluator for FakeEvaluator {
    fn evaluate(
        &self,
        _model: &TrainedModel,
        test: &LabeledDataset,
    ) -> std::result::Result<EvaluationReport, CollaboratorError> {
        match self {
            FakeEvaluator::Metrics(metrics) => Ok(EvaluationReport {
                metrics: *metrics,
                precision_churn: 0.5,
                f1_churn: 0.6,
                confusion: ConfusionMatrix::default(),
                threshold: 0.40,
                samples: test.rows,
            }),
            FakeEvaluator::Fails => Err("predict_proba failed".into()),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    registry: Arc<RedbRegistry>,
    tracking: Arc<TrackingLog>,
    _dir: TempDir,
}

fn harness(initial: ModelMetrics) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let registry = Arc::new(RedbRegistry::open(dir.path().join("churnops.redb")).unwrap());
    let tracking = Arc::new(TrackingLog::new(registry.database()).unwrap());
    registry
        .bootstrap(&ModelCandidate {
            model_id: "logreg-baseline".into(),
            artifact: ModelArtifact::new("models/production_pipeline.joblib"),
            metrics: initial,
        })
        .unwrap();
    Harness { registry, tracking, _dir: dir }
}

fn orchestrator(h: &Harness) -> RetrainingOrchestrator<RedbRegistry, TrackingLog> {
    RetrainingOrchestrator::new(h.registry.clone(), h.tracking.clone(), PromotionDecider::default())
}

fn ok_source() -> FakeSource {
    FakeSource { fail_load: false, fail_split: false }
}

/// Asserts the run stopped at `stage` with production still at v1.
fn assert_failed_at(h: &Harness, err: ChurnOpsError, stage: RetrainingStage, before: &ProductionModelRecord) {
    assert!(matches!(
        err,
        ChurnOpsError::RetrainingFailed { stage: s, .. } if s == stage
    ));
    assert_eq!(*h.registry.current().unwrap(), *before);
    assert_eq!(h.registry.history().unwrap().len(), 1);

    let failures = h.tracking.query(TrackingFilter::new().with_kind("run_failed")).unwrap();
    assert_eq!(failures.len(), 1);
    match &failures[0].event {
        TrackingEvent::RunFailed { stage: tracked, .. } => assert_eq!(*tracked, stage),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(h.tracking.query(TrackingFilter::new().with_kind("decision")).unwrap().is_empty());
}

// ── End to end ───────────────────────────────────────────────────────────────

#[test]
fn promote_then_keep() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let orch = orchestrator(&h);

    let first = orch
        .run_once(
            &ok_source(),
            &FakeTrainer::new("logreg-r1"),
            &FakeEvaluator::Metrics(ModelMetrics::new(0.84, 0.72)),
        )
        .unwrap();
    assert_eq!(first.decision.outcome, PromotionOutcome::Promote);
    assert_eq!(first.production.version, 2);
    let current = h.registry.current().unwrap();
    assert_eq!(current.model_id, "logreg-r1");
    assert_eq!(current.metrics, ModelMetrics::new(0.84, 0.72));
    assert_eq!(current.run_id, Some(first.run_id));

    let second = orch
        .run_once(
            &ok_source(),
            &FakeTrainer::new("logreg-r2"),
            &FakeEvaluator::Metrics(ModelMetrics::new(0.80, 0.73)),
        )
        .unwrap();
    assert_eq!(second.decision.outcome, PromotionOutcome::Keep);
    assert_eq!(second.decision.current, ModelMetrics::new(0.84, 0.72));
    assert_eq!(
        second.decision.keep_reasons,
        vec![KeepReason::RocAucBelowFloor { candidate: 0.80, floor: 0.82 }]
    );
    assert_eq!(second.production.version, 2);
    assert_eq!(h.registry.current().unwrap().model_id, "logreg-r1");
    assert_eq!(h.registry.history().unwrap().len(), 2);
}

#[test]
fn trainer_receives_production_preprocessing() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let trainer = FakeTrainer::new("logreg-r1");
    orchestrator(&h)
        .run_once(&ok_source(), &trainer, &FakeEvaluator::Metrics(ModelMetrics::new(0.84, 0.72)))
        .unwrap();
    assert_eq!(
        trainer.seen_preprocessing.lock().unwrap().clone(),
        Some(PreprocessingSpec::default())
    );
}

#[test]
fn decision_is_tracked_with_versions() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let triggers: BTreeSet<_> = [RetrainingTrigger::NewLabeledData].into_iter().collect();
    let report = orchestrator(&h)
        .run(
            new_run_id(),
            triggers,
            &ok_source(),
            &FakeTrainer::new("logreg-r1"),
            &FakeEvaluator::Metrics(ModelMetrics::new(0.84, 0.72)),
        )
        .unwrap();

    let entries = h
        .tracking
        .query(TrackingFilter::new().with_run(report.run_id))
        .unwrap();
    let kinds: Vec<&str> = entries.iter().map(|e| e.event.kind()).collect();
    assert_eq!(
        kinds,
        vec!["run_started", "candidate_trained", "candidate_evaluated", "decision"]
    );
    match &entries[3].event {
        TrackingEvent::Decision { version_before, version_after, decision, .. } => {
            assert_eq!((*version_before, *version_after), (1, 2));
            assert!(decision.is_promote());
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn evaluator_failure_leaves_production_untouched() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let before = h.registry.current().unwrap();

    let err = orchestrator(&h)
        .run_once(&ok_source(), &FakeTrainer::new("logreg-r1"), &FakeEvaluator::Fails)
        .unwrap_err();

    assert!(matches!(
        err,
        ChurnOpsError::RetrainingFailed { stage: RetrainingStage::Evaluate, .. }
    ));
    assert_eq!(*h.registry.current().unwrap(), *before);
    assert_eq!(h.registry.history().unwrap().len(), 1);

    let failures = h.tracking.query(TrackingFilter::new().with_kind("run_failed")).unwrap();
    assert_eq!(failures.len(), 1);
}

#[test]
fn split_failure_leaves_production_untouched() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let before = h.registry.current().unwrap();
    let trainer = FakeTrainer::new("logreg-r1");

    let err = orchestrator(&h)
        .run_once(
            &FakeSource { fail_load: false, fail_split: true },
            &trainer,
            &FakeEvaluator::Metrics(ModelMetrics::new(0.9, 0.9)),
        )
        .unwrap_err();

    assert!(err.to_string().contains("cannot stratify"));
    assert_failed_at(&h, err, RetrainingStage::Split, &before);
    // Training never started.
    assert!(trainer.seen_preprocessing.lock().unwrap().is_none());
}

#[test]
fn training_failure_leaves_production_untouched() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let before = h.registry.current().unwrap();
    let mut trainer = FakeTrainer::new("logreg-r1");
    trainer.fails = true;

    let err = orchestrator(&h)
        .run_once(&ok_source(), &trainer, &FakeEvaluator::Metrics(ModelMetrics::new(0.9, 0.9)))
        .unwrap_err();

    assert_eq!(err.stage(), Some(RetrainingStage::Train));
    assert_failed_at(&h, err, RetrainingStage::Train, &before);
}

#[test]
fn dataset_failure_names_its_stage() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let err = orchestrator(&h)
        .run_once(
            &FakeSource { fail_load: true, fail_split: false },
            &FakeTrainer::new("logreg-r1"),
            &FakeEvaluator::Metrics(ModelMetrics::new(0.9, 0.9)),
        )
        .unwrap_err();
    assert_eq!(err.stage(), Some(RetrainingStage::DatasetLoad));
    assert!(err.to_string().contains("dataset file missing"));
}

#[test]
fn invalid_candidate_metrics_fail_closed() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let report = orchestrator(&h)
        .run_once(
            &ok_source(),
            &FakeTrainer::new("logreg-r1"),
            &FakeEvaluator::Metrics(ModelMetrics::new(f64::NAN, 0.90)),
        )
        .unwrap();
    assert_eq!(report.decision.outcome, PromotionOutcome::Keep);
    assert!(matches!(
        report.decision.keep_reasons[0],
        KeepReason::InvalidMetrics { .. }
    ));
    assert_eq!(h.registry.current().unwrap().version, 1);
}

#[test]
fn cancelled_run_does_not_swap() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let token = CancellationToken::new();
    let cancel_during_training = token.clone();
    let mut trainer = FakeTrainer::new("logreg-r1");
    trainer.during = Some(Box::new(move || cancel_during_training.cancel()));

    let err = orchestrator(&h)
        .with_cancellation(token)
        .run_once(&ok_source(), &trainer, &FakeEvaluator::Metrics(ModelMetrics::new(0.9, 0.9)))
        .unwrap_err();

    assert!(matches!(
        err,
        ChurnOpsError::Cancelled { stage: RetrainingStage::Evaluate }
    ));
    assert_eq!(h.registry.current().unwrap().version, 1);
}

#[test]
fn concurrent_production_change_is_not_overwritten() {
    let h = harness(ModelMetrics::new(0.83, 0.71));
    let registry = h.registry.clone();
    let mut trainer = FakeTrainer::new("logreg-r1");
    trainer.during = Some(Box::new(move || {
        registry
            .promote(
                1,
                &ModelCandidate {
                    model_id: "hotfix".into(),
                    artifact: ModelArtifact::new("models/hotfix.joblib"),
                    metrics: ModelMetrics::new(0.85, 0.72),
                },
                None,
            )
            .unwrap();
    }));

    let err = orchestrator(&h)
        .run_once(&ok_source(), &trainer, &FakeEvaluator::Metrics(ModelMetrics::new(0.9, 0.9)))
        .unwrap_err();

    assert!(matches!(
        err,
        ChurnOpsError::StaleProductionVersion { expected: 1, actual: 2 }
    ));
    assert_eq!(h.registry.current().unwrap().model_id, "hotfix");
}

#[test]
fn run_without_production_model_fails_fast() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(RedbRegistry::open(dir.path().join("churnops.redb")).unwrap());
    let tracking = Arc::new(TrackingLog::new(registry.database()).unwrap());
    let orch = RetrainingOrchestrator::new(registry, tracking, PromotionDecider::default());

    let err = orch
        .run_once(
            &ok_source(),
            &FakeTrainer::new("logreg-r1"),
            &FakeEvaluator::Metrics(ModelMetrics::new(0.9, 0.9)),
        )
        .unwrap_err();
    assert!(matches!(err, ChurnOpsError::NoProductionModel));
}
