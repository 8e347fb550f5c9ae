use super::LogArgs;
use crate::config::ChurnOpsConfig;
use anyhow::Result;
use chrono::{Duration, Utc};
use churnops_core::{RedbRegistry, TrackingEntry, TrackingEvent, TrackingFilter, TrackingLog};

pub async fn run(args: LogArgs, config: ChurnOpsConfig) -> Result<()> {
    let db_path = config.db_path();
    if !db_path.exists() {
        anyhow::bail!(
            "Registry not found at {:?}. Run `churnops registry init` first.",
            db_path
        );
    }

    let registry = RedbRegistry::open(&db_path)?;
    let tracking = TrackingLog::new(registry.database())?;

    let mut filter = TrackingFilter::new().with_limit(args.limit);
    if let Some(ref run) = args.run {
        let run_id = uuid::Uuid::parse_str(run).map_err(|_| anyhow::anyhow!("Invalid run id: {}", run))?;
        filter = filter.with_run(run_id);
    }
    if let Some(ref kind) = args.kind {
        filter = filter.with_kind(kind.clone());
    }
    if let Some(ref since) = args.since {
        filter = filter.with_since(parse_duration(since)?);
    }

    let entries = tracking.query(filter)?;
    if entries.is_empty() {
        println!("(no tracking entries found)");
        return Ok(());
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            println!("{:<20}  {:<20}  {:<36}  {}", "TIME", "EVENT", "RUN", "DETAILS");
            println!("{}", "─".repeat(110));
            for entry in &entries {
                println!(
                    "{:<20}  {:<20}  {:<36}  {}",
                    entry.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
                    entry.event.kind(),
                    entry.run_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
                    details(entry),
                );
            }
            println!();
            println!("{} entries", entries.len());
        }
    }
    Ok(())
}

fn details(entry: &TrackingEntry) -> String {
    match &entry.event {
        TrackingEvent::RunStarted { production_version, triggers } => {
            let names: Vec<&str> = triggers.iter().map(|t| t.as_str()).collect();
            format!("production v{}, triggers [{}]", production_version, names.join(", "))
        }
        TrackingEvent::CandidateTrained { model_id, artifact, .. } => {
            format!("{} -> {}", model_id, artifact.uri)
        }
        TrackingEvent::CandidateEvaluated { model_id, report } => {
            format!(
                "{}: roc_auc={:.4} recall={:.4}",
                model_id, report.metrics.roc_auc, report.metrics.recall_churn
            )
        }
        TrackingEvent::Decision { model_id, decision, version_before, version_after } => {
            format!(
                "{} {}, v{} -> v{}",
                model_id, decision.outcome, version_before, version_after
            )
        }
        TrackingEvent::RunFailed { stage, message } => format!("{}: {}", stage, message),
        TrackingEvent::Bootstrapped { version, model_id } => format!("{} as v{}", model_id, version),
        TrackingEvent::RolledBack { from_version, to_version, new_version } => {
            format!("v{} -> v{} (recorded as v{})", from_version, to_version, new_version)
        }
    }
}

/// Parse a human-readable duration like "24h", "7d", "1h30m" into a UTC timestamp.
fn parse_duration(s: &str) -> Result<chrono::DateTime<Utc>> {
    let s = s.trim();
    let too_long = || anyhow::anyhow!("Duration '{}' is too long", s);
    let mut remaining = s;
    let mut total_seconds: i64 = 0;

    while !remaining.is_empty() {
        let split_at = remaining
            .find(|c: char| c.is_alphabetic())
            .ok_or_else(|| anyhow::anyhow!("Cannot parse duration '{}': expected format like '24h', '7d'", s))?;
        let num: i64 = remaining[..split_at]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid number in duration '{}'", s))?;

        let rest = &remaining[split_at..];
        let unit_end = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit_seconds: i64 = match &rest[..unit_end] {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            "w" => 7 * 86400,
            unit => anyhow::bail!("Unknown time unit '{}' in duration '{}'", unit, s),
        };
        total_seconds = num
            .checked_mul(unit_seconds)
            .and_then(|secs| total_seconds.checked_add(secs))
            .ok_or_else(too_long)?;
        remaining = &rest[unit_end..];
    }

    let span = Duration::try_seconds(total_seconds).ok_or_else(too_long)?;
    Utc::now().checked_sub_signed(span).ok_or_else(too_long)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        let before = Utc::now();
        let t = parse_duration("1h30m").unwrap();
        let elapsed = before - t;
        assert!(elapsed >= Duration::seconds(5400) - Duration::seconds(1));
        assert!(elapsed <= Duration::seconds(5400) + Duration::seconds(1));
        assert!(parse_duration("3x").is_err());
        assert!(parse_duration("h").is_err());
    }

    #[test]
    fn oversized_durations_are_errors() {
        for input in ["999999999999d", "99999999999999999w", "9223372036854775807s1s"] {
            let err = parse_duration(input).unwrap_err();
            assert!(err.to_string().contains("too long"), "{}: {}", input, err);
        }
    }
}
