use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    CancellationToken, DatasetSource, Evaluator, PreprocessingSpec, SplitStrategy, Trainer,
};
use crate::error::{ChurnOpsError, CollaboratorError, Result};
use crate::eval::EvaluationReport;
use crate::promotion::{PromotionDecider, PromotionDecision};
use crate::registry::ModelRegistry;
use crate::tracking::{TrackingEntry, TrackingEvent, TrackingSink};
use crate::trigger::RetrainingTrigger;
use crate::types::{
    new_run_id, ModelCandidate, ProductionModelRecord, RetrainingStage, RunId,
};

/// Everything one completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub triggers: BTreeSet<RetrainingTrigger>,
    pub candidate: ModelCandidate,
    pub evaluation: EvaluationReport,
    pub decision: PromotionDecision,
    /// Production after the run: the candidate on promote, the incumbent otherwise.
    pub production: ProductionModelRecord,
}

/// Sequences one retraining run: load → split → train → evaluate → decide → swap.
///
/// Any stage failure aborts the run before the registry is touched. The swap
/// is a compare-and-swap against the production version read at the start,
/// so a run never overwrites a promotion or rollback it did not see.
pub struct RetrainingOrchestrator<R: ModelRegistry, T: TrackingSink> {
    registry: Arc<R>,
    tracking: Arc<T>,
    decider: PromotionDecider,
    split: SplitStrategy,
    preprocessing: PreprocessingSpec,
    cancel: CancellationToken,
}

impl<R: ModelRegistry, T: TrackingSink> RetrainingOrchestrator<R, T> {
    pub fn new(registry: Arc<R>, tracking: Arc<T>, decider: PromotionDecider) -> Self {
        Self {
            registry,
            tracking,
            decider,
            split: SplitStrategy::default(),
            preprocessing: PreprocessingSpec::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingSpec) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run once with a fresh run id and no recorded triggers.
    pub fn run_once(
        &self,
        source: &dyn DatasetSource,
        trainer: &dyn Trainer,
        evaluator: &dyn Evaluator,
    ) -> Result<RunReport> {
        self.run(new_run_id(), BTreeSet::new(), source, trainer, evaluator)
    }

    pub fn run(
        &self,
        run_id: RunId,
        triggers: BTreeSet<RetrainingTrigger>,
        source: &dyn DatasetSource,
        trainer: &dyn Trainer,
        evaluator: &dyn Evaluator,
    ) -> Result<RunReport> {
        let current = self.registry.current()?;
        log::info!(
            "Retraining run {} started against production v{} ({})",
            run_id,
            current.version,
            current.model_id
        );
        self.track(
            run_id,
            TrackingEvent::RunStarted {
                production_version: current.version,
                triggers: triggers.clone(),
            },
        );

        match self.execute(run_id, &triggers, &current, source, trainer, evaluator) {
            Ok(report) => Ok(report),
            Err(e) => {
                let stage = e.stage().unwrap_or(RetrainingStage::Promote);
                log::error!("Retraining run {} aborted at {}: {}", run_id, stage, e);
                self.track(
                    run_id,
                    TrackingEvent::RunFailed { stage, message: e.to_string() },
                );
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        run_id: RunId,
        triggers: &BTreeSet<RetrainingTrigger>,
        current: &Arc<ProductionModelRecord>,
        source: &dyn DatasetSource,
        trainer: &dyn Trainer,
        evaluator: &dyn Evaluator,
    ) -> Result<RunReport> {
        let dataset = self.stage(RetrainingStage::DatasetLoad, || source.load())?;
        log::info!(
            "Loaded {} ({} rows, {} churners)",
            dataset.location,
            dataset.rows,
            dataset.positive_rows
        );

        let split = self.stage(RetrainingStage::Split, || source.split(&dataset, &self.split))?;
        log::info!(
            "Split: {} train / {} test rows (test_fraction={}, seed={})",
            split.train.rows,
            split.test.rows,
            split.strategy.test_fraction,
            split.strategy.seed
        );

        let model = self.stage(RetrainingStage::Train, || {
            trainer.train(&split.train, &self.preprocessing)
        })?;
        self.track(
            run_id,
            TrackingEvent::CandidateTrained {
                model_id: model.model_id.clone(),
                artifact: model.artifact.clone(),
                metadata: model.metadata.clone(),
            },
        );

        let evaluation = self.stage(RetrainingStage::Evaluate, || {
            evaluator.evaluate(&model, &split.test)
        })?;
        log::info!("Candidate {}: {}", model.model_id, evaluation.summary());
        self.track(
            run_id,
            TrackingEvent::CandidateEvaluated {
                model_id: model.model_id.clone(),
                report: evaluation.clone(),
            },
        );

        self.check_cancelled(RetrainingStage::Decide)?;
        let candidate = model.candidate(evaluation.metrics);
        let decision = self.decider.decide_fail_closed(&current.metrics, &candidate.metrics);

        let production = if decision.is_promote() {
            self.check_cancelled(RetrainingStage::Promote)?;
            self.registry.promote(current.version, &candidate, Some(run_id))?
        } else {
            log::info!(
                "Keeping production v{}: {}",
                current.version,
                decision
                    .keep_reasons
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
            current.clone()
        };

        self.track(
            run_id,
            TrackingEvent::Decision {
                model_id: candidate.model_id.clone(),
                decision: decision.clone(),
                version_before: current.version,
                version_after: production.version,
            },
        );

        Ok(RunReport {
            run_id,
            triggers: triggers.clone(),
            candidate,
            evaluation,
            decision,
            production: (*production).clone(),
        })
    }

    fn check_cancelled(&self, stage: RetrainingStage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ChurnOpsError::Cancelled { stage });
        }
        Ok(())
    }

    fn stage<V>(
        &self,
        stage: RetrainingStage,
        f: impl FnOnce() -> std::result::Result<V, CollaboratorError>,
    ) -> Result<V> {
        self.check_cancelled(stage)?;
        log::debug!("Stage {} starting", stage);
        f().map_err(|source| ChurnOpsError::RetrainingFailed { stage, source })
    }

    /// Tracking is best effort: a failed write must not undo a committed swap.
    fn track(&self, run_id: RunId, event: TrackingEvent) {
        let kind = event.kind();
        if let Err(e) = self.tracking.record(TrackingEntry::now(Some(run_id), event)) {
            log::warn!("Failed to track {} for run {}: {}", kind, run_id, e);
        }
    }
}
