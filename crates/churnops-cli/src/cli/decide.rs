use super::DecideArgs;
use crate::config::ChurnOpsConfig;
use anyhow::Result;
use churnops_core::{ModelMetrics, PromotionDecider};

pub async fn run(args: DecideArgs, config: ChurnOpsConfig) -> Result<()> {
    let current = ModelMetrics::new(args.current_roc_auc, args.current_recall);
    let candidate = ModelMetrics::new(args.candidate_roc_auc, args.candidate_recall);

    let decider = PromotionDecider::new(config.promotion);
    match decider.decide(&current, &candidate) {
        Ok(decision) => {
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Invalid metrics: {}", e);
            std::process::exit(2);
        }
    }
}
