use super::{FormatArgs, RegistryCommands, RegistryInitArgs, RollbackArgs};
use crate::adapters::sha256_file;
use crate::config::ChurnOpsConfig;
use anyhow::Result;
use churnops_core::{
    ModelArtifact, ModelCandidate, ModelMetrics, ModelRegistry, MetricsRole,
    ProductionModelRecord, RedbRegistry, TrackingEntry, TrackingEvent, TrackingLog, TrackingSink,
};
use std::path::Path;
use std::sync::Arc;

/// Open the registry and the tracking log that shares its database file.
pub fn open_stores(config: &ChurnOpsConfig) -> Result<(Arc<RedbRegistry>, Arc<TrackingLog>)> {
    config.ensure_data_dir()?;
    let registry = Arc::new(RedbRegistry::open(config.db_path())?);
    let tracking = Arc::new(TrackingLog::new(registry.database())?);
    Ok((registry, tracking))
}

pub async fn run(cmd: RegistryCommands, config: ChurnOpsConfig) -> Result<()> {
    match cmd {
        RegistryCommands::Init(args) => init(args, &config),
        RegistryCommands::Status(args) => status(args, &config),
        RegistryCommands::History(args) => history(args, &config),
        RegistryCommands::Rollback(args) => rollback(args, &config),
    }
}

fn init(args: RegistryInitArgs, config: &ChurnOpsConfig) -> Result<()> {
    let metrics = ModelMetrics::new(args.roc_auc, args.recall);
    metrics.validate(MetricsRole::Current)?;

    let mut artifact = ModelArtifact::new(&args.artifact);
    let local = Path::new(&args.artifact);
    if local.is_file() {
        artifact = artifact.with_sha256(sha256_file(local)?);
    }
    let candidate = ModelCandidate {
        model_id: args.model_id,
        artifact,
        metrics,
    };

    let (registry, tracking) = open_stores(config)?;
    let record = registry.bootstrap(&candidate)?;
    record_event(
        &*tracking,
        TrackingEvent::Bootstrapped {
            version: record.version,
            model_id: record.model_id.clone(),
        },
    );
    println!("Registered {} as production v{}", record.model_id, record.version);
    Ok(())
}

fn status(args: FormatArgs, config: &ChurnOpsConfig) -> Result<()> {
    let (registry, _) = open_stores(config)?;
    let record = registry.current()?;
    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&*record)?),
        _ => {
            println!("Version:    v{}", record.version);
            println!("Model:      {}", record.model_id);
            println!("Artifact:   {}", record.artifact.uri);
            if let Some(ref digest) = record.artifact.sha256 {
                println!("SHA-256:    {}", digest);
            }
            println!("ROC-AUC:    {:.4}", record.metrics.roc_auc);
            println!("Recall:     {:.4}", record.metrics.recall_churn);
            println!("Change:     {}", record.change);
            println!("Recorded:   {}", record.recorded_at.format("%Y-%m-%dT%H:%M:%SZ"));
            if let Some(run_id) = record.run_id {
                println!("Run:        {}", run_id);
            }
        }
    }
    Ok(())
}

fn history(args: FormatArgs, config: &ChurnOpsConfig) -> Result<()> {
    let (registry, _) = open_stores(config)?;
    let records = registry.history()?;
    if records.is_empty() {
        println!("(no production model registered)");
        return Ok(());
    }
    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => print_table(&records),
    }
    Ok(())
}

fn print_table(records: &[ProductionModelRecord]) {
    println!(
        "{:<8}  {:<28}  {:>8}  {:>8}  {:<20}  {}",
        "VERSION", "MODEL", "ROC-AUC", "RECALL", "RECORDED", "CHANGE"
    );
    println!("{}", "─".repeat(100));
    for r in records {
        println!(
            "{:<8}  {:<28}  {:>8.4}  {:>8.4}  {:<20}  {}",
            format!("v{}", r.version),
            r.model_id,
            r.metrics.roc_auc,
            r.metrics.recall_churn,
            r.recorded_at.format("%Y-%m-%dT%H:%M:%SZ"),
            r.change,
        );
    }
    println!();
    println!("{} versions", records.len());
}

fn rollback(args: RollbackArgs, config: &ChurnOpsConfig) -> Result<()> {
    let (registry, tracking) = open_stores(config)?;
    let from_version = registry.current()?.version;
    let record = registry.rollback(args.to)?;
    record_event(
        &*tracking,
        TrackingEvent::RolledBack {
            from_version,
            to_version: args.to,
            new_version: record.version,
        },
    );
    println!(
        "Production rolled back from v{} to v{} ({}), recorded as v{}",
        from_version, args.to, record.model_id, record.version
    );
    Ok(())
}

/// Operator actions are tracked best effort, like run events.
fn record_event(tracking: &dyn TrackingSink, event: TrackingEvent) {
    if let Err(e) = tracking.record(TrackingEntry::now(None, event)) {
        tracing::warn!("Failed to record tracking entry: {}", e);
    }
}
