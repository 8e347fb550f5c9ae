use super::ShouldRetrainArgs;
use crate::config::ChurnOpsConfig;
use anyhow::Result;
use churnops_core::{SignalCollector, TriggerEvaluator, TriggerOutcome};

/// Collect signals and evaluate the triggers. Shared with `retrain`.
pub fn check(config: &ChurnOpsConfig, force: bool, recent_recall: Option<f64>) -> TriggerOutcome {
    let collector = SignalCollector::new(config.signals.clone(), config.trigger.clone());
    let mut signals = collector.collect(force);
    if let Some(recall) = recent_recall {
        signals = signals.with_recent_recall(recall);
    }
    tracing::debug!("Signals: {:?}", signals);
    TriggerEvaluator::new(config.trigger.clone()).should_retrain(&signals)
}

pub async fn run(args: ShouldRetrainArgs, config: ChurnOpsConfig) -> Result<()> {
    // Exit 1 means "no retrain", so bad input gets its own code.
    if let Some(recall) = args.recent_recall {
        if !(0.0..=1.0).contains(&recall) {
            eprintln!("--recent-recall must be in [0, 1], got {}", recall);
            std::process::exit(2);
        }
    }
    let outcome = check(&config, args.force, args.recent_recall);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.retrain {
        std::process::exit(1);
    }
    Ok(())
}
