use super::EvaluateArgs;
use crate::adapters::read_predictions;
use crate::config::ChurnOpsConfig;
use anyhow::{Context, Result};
use churnops_core::evaluate;

pub async fn run(args: EvaluateArgs, config: ChurnOpsConfig) -> Result<()> {
    let threshold = match args.threshold {
        Some(t) if (0.0..=1.0).contains(&t) => t,
        Some(t) => anyhow::bail!("--threshold must be in [0, 1], got {}", t),
        None => config.effective_scoring().business_threshold,
    };

    let samples = read_predictions(&args.predictions)
        .with_context(|| format!("reading {}", args.predictions.display()))?;
    let report = evaluate(&samples, threshold);

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!("{}", report.summary());
            let [[tn, fp], [fn_, tp]] = report.confusion.as_rows();
            println!();
            println!("{:>12}  {:>10}  {:>10}", "", "pred stay", "pred churn");
            println!("{:>12}  {:>10}  {:>10}", "actual stay", tn, fp);
            println!("{:>12}  {:>10}  {:>10}", "actual churn", fn_, tp);
        }
    }
    Ok(())
}
