use chrono::{DateTime, Utc};
use redb::{Database, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::eval::EvaluationReport;
use crate::promotion::PromotionDecision;
use crate::trigger::RetrainingTrigger;
use crate::types::{ModelArtifact, RetrainingStage, RunId, TrainingMetadata};

const TRACKING_TABLE: TableDefinition<u128, &[u8]> = TableDefinition::new("tracking");

/// Receives audit records from retraining runs and registry changes.
pub trait TrackingSink: Send + Sync {
    fn record(&self, entry: TrackingEntry) -> crate::Result<()>;
}

/// A single tracked event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub timestamp: DateTime<Utc>,
    /// Run this event belongs to. `None` for operator actions outside a run.
    pub run_id: Option<RunId>,
    pub event: TrackingEvent,
}

impl TrackingEntry {
    pub fn now(run_id: Option<RunId>, event: TrackingEvent) -> Self {
        Self { timestamp: Utc::now(), run_id, event }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    RunStarted {
        production_version: u64,
        triggers: BTreeSet<RetrainingTrigger>,
    },
    CandidateTrained {
        model_id: String,
        artifact: ModelArtifact,
        metadata: TrainingMetadata,
    },
    CandidateEvaluated {
        model_id: String,
        report: EvaluationReport,
    },
    Decision {
        model_id: String,
        decision: PromotionDecision,
        version_before: u64,
        /// Production version after the decision; differs from `version_before` only on promote.
        version_after: u64,
    },
    RunFailed {
        stage: RetrainingStage,
        message: String,
    },
    Bootstrapped {
        version: u64,
        model_id: String,
    },
    RolledBack {
        from_version: u64,
        to_version: u64,
        new_version: u64,
    },
}

impl TrackingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::CandidateTrained { .. } => "candidate_trained",
            Self::CandidateEvaluated { .. } => "candidate_evaluated",
            Self::Decision { .. } => "decision",
            Self::RunFailed { .. } => "run_failed",
            Self::Bootstrapped { .. } => "bootstrapped",
            Self::RolledBack { .. } => "rolled_back",
        }
    }
}

/// Append-only log of tracked events, stored in a dedicated redb table.
pub struct TrackingLog {
    db: Arc<Database>,
    /// Monotonic counter to disambiguate entries within the same nanosecond.
    seq: AtomicU64,
}

impl TrackingLog {
    pub fn new(db: Arc<Database>) -> crate::Result<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TRACKING_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db, seq: AtomicU64::new(0) })
    }

    /// Query entries, oldest first.
    pub fn query(&self, filter: TrackingFilter) -> crate::Result<Vec<TrackingEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRACKING_TABLE)?;

        let since_nanos = filter
            .since
            .and_then(|t| t.timestamp_nanos_opt())
            .map(|n| (n.max(0) as u128) << 32)
            .unwrap_or(0);

        let mut entries = Vec::new();
        for result in table.range(since_nanos..)? {
            let (_, value) = result?;
            let entry = match serde_json::from_slice::<TrackingEntry>(value.value()) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable tracking entry: {}", e);
                    continue;
                }
            };

            if let Some(run_id) = filter.run_id {
                if entry.run_id != Some(run_id) {
                    continue;
                }
            }
            if let Some(ref kind) = filter.kind {
                if entry.event.kind() != kind {
                    continue;
                }
            }
            entries.push(entry);
        }

        if let Some(limit) = filter.limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }
}

impl TrackingSink for TrackingLog {
    /// Key is `timestamp_nanos << 32 | seq` for time-ordered iteration.
    fn record(&self, entry: TrackingEntry) -> crate::Result<()> {
        let nanos = entry.timestamp.timestamp_nanos_opt().unwrap_or(0).max(0) as u128;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) as u128;
        let key = (nanos << 32) | (seq & 0xFFFF_FFFF);
        let value = serde_json::to_vec(&entry)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TRACKING_TABLE)?;
            table.insert(key, value.as_slice())?;
        }
        write_txn.commit()?;
        log::debug!("Tracked {} for run {:?}", entry.event.kind(), entry.run_id);
        Ok(())
    }
}

/// Filters for `TrackingLog::query`.
#[derive(Debug, Clone, Default)]
pub struct TrackingFilter {
    pub run_id: Option<RunId>,
    pub since: Option<DateTime<Utc>>,
    pub kind: Option<String>,
    /// Keep only the newest `limit` matches.
    pub limit: Option<usize>,
}

impl TrackingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
