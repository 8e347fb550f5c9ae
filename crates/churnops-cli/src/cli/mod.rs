pub mod config_cmd;
pub mod decide;
pub mod evaluate;
pub mod log_cmd;
pub mod registry;
pub mod retrain;
pub mod should_retrain;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "churnops")]
#[command(version, about = "Decide when to retrain the churn model and whether to promote the result")]
pub struct Cli {
    /// Path to churnops.toml
    #[arg(
        long,
        global = true,
        env = "CHURNOPS_CONFIG",
        default_value = "churnops.toml"
    )]
    pub config: PathBuf,

    /// Path to data directory (overrides config file)
    #[arg(long, global = true, env = "CHURNOPS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check monitoring signals; exit 0 when retraining should run, 1 otherwise
    ShouldRetrain(ShouldRetrainArgs),
    /// Apply the promotion rule to two sets of metrics
    Decide(DecideArgs),
    /// Compute evaluation metrics from a predictions file
    Evaluate(EvaluateArgs),
    /// Run one retraining cycle and promote or keep the candidate
    Retrain(RetrainArgs),
    /// Production model registry
    #[command(subcommand)]
    Registry(RegistryCommands),
    /// Query the tracking log
    Log(LogArgs),
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ShouldRetrainArgs {
    /// Treat this as a manual retraining request
    #[arg(long, env = "FORCE_RETRAIN")]
    pub force: bool,
    /// Recent production recall, overriding the latest metrics file
    #[arg(long, allow_negative_numbers = true)]
    pub recent_recall: Option<f64>,
}

#[derive(Args, Debug)]
pub struct DecideArgs {
    /// ROC-AUC of the production model
    #[arg(long)]
    pub current_roc_auc: f64,
    /// Churn recall of the production model
    #[arg(long)]
    pub current_recall: f64,
    /// ROC-AUC of the candidate
    #[arg(long)]
    pub candidate_roc_auc: f64,
    /// Churn recall of the candidate
    #[arg(long)]
    pub candidate_recall: f64,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// CSV with `label,probability` columns
    pub predictions: PathBuf,
    /// Decision threshold (defaults to the tuned or configured business threshold)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Output format: text (default) | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct RetrainArgs {
    /// Record the run as manually requested
    #[arg(long, env = "FORCE_RETRAIN")]
    pub force: bool,
    /// Run even when no trigger fires
    #[arg(long)]
    pub skip_trigger_check: bool,
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommands {
    /// Register the first production model
    Init(RegistryInitArgs),
    /// Show the current production model
    Status(FormatArgs),
    /// List every production version, oldest first
    History(FormatArgs),
    /// Re-point production at an earlier version
    Rollback(RollbackArgs),
}

#[derive(Args, Debug)]
pub struct RegistryInitArgs {
    #[arg(long)]
    pub model_id: String,
    /// Path or URI of the model artifact
    #[arg(long)]
    pub artifact: String,
    #[arg(long)]
    pub roc_auc: f64,
    #[arg(long)]
    pub recall: f64,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Version to restore
    #[arg(long)]
    pub to: u64,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Output format: table (default) | json
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Only entries of this run
    #[arg(long)]
    pub run: Option<String>,
    /// Only this event kind (e.g. "decision", "run_failed")
    #[arg(long)]
    pub kind: Option<String>,
    /// Only entries since this duration (e.g. "24h", "7d", "1h30m")
    #[arg(long)]
    pub since: Option<String>,
    /// Maximum number of entries to return
    #[arg(long, default_value = "20")]
    pub limit: usize,
    /// Output format: table (default) | json
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Validate,
    Show,
}
