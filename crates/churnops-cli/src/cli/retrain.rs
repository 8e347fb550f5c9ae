use super::registry::open_stores;
use super::should_retrain::check;
use super::RetrainArgs;
use crate::adapters::{CommandTrainer, FsDatasetSource, PredictionsEvaluator};
use crate::config::ChurnOpsConfig;
use anyhow::Result;
use churnops_core::{new_run_id, PromotionDecider, PromotionOutcome, RetrainingOrchestrator, RunReport};

pub async fn run(args: RetrainArgs, config: ChurnOpsConfig) -> Result<()> {
    let outcome = check(&config, args.force, None);
    if !outcome.retrain && !args.skip_trigger_check {
        println!("No retraining trigger fired; production model kept.");
        for reason in &outcome.reasons {
            println!("  - {}", reason);
        }
        return Ok(());
    }
    if outcome.retrain {
        for reason in &outcome.reasons {
            tracing::info!("Trigger: {}", reason);
        }
    } else {
        tracing::info!("No trigger fired; running anyway");
    }

    let (registry, tracking) = open_stores(&config)?;
    let run_id = new_run_id();
    let run_dir = config.training.runs_dir.join(run_id.to_string());
    tracing::info!("Run {} working in {}", run_id, run_dir.display());

    let source = FsDatasetSource::new(
        &config.training.dataset,
        config.training.target_column.clone(),
        &run_dir,
    );
    let mut trainer = CommandTrainer::new(
        config.training.train_command.clone(),
        &run_dir,
        config.split.clone(),
    );
    if config.training.predict_command.is_empty() {
        trainer = trainer.with_test_path(run_dir.join("test.csv"));
    }
    let evaluator = PredictionsEvaluator::new(
        config.training.predict_command.clone(),
        &run_dir,
        config.effective_scoring().business_threshold,
    );

    let orchestrator = RetrainingOrchestrator::new(
        registry,
        tracking,
        PromotionDecider::new(config.promotion.clone()),
    )
    .with_split(config.split.clone())
    .with_preprocessing(config.preprocessing.clone());
    let cancel = orchestrator.cancellation();

    let triggers = outcome.triggers;
    let mut handle = tokio::task::spawn_blocking(move || {
        orchestrator.run(run_id, triggers, &source, &trainer, &evaluator)
    });

    let joined = tokio::select! {
        res = &mut handle => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; stopping run {} before its next stage", run_id);
            cancel.cancel();
            handle.await
        }
    };
    let report = joined??;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run:        {}", report.run_id);
    println!("Candidate:  {}", report.candidate.model_id);
    println!("Evaluation: {}", report.evaluation.summary());
    match report.decision.outcome {
        PromotionOutcome::Promote => println!(
            "Decision:   promote -> production v{} ({})",
            report.production.version, report.production.model_id
        ),
        PromotionOutcome::Keep => {
            println!(
                "Decision:   keep production v{} ({})",
                report.production.version, report.production.model_id
            );
            for reason in &report.decision.keep_reasons {
                println!("  - {}", reason);
            }
        }
    }
}
