use crate::error::Result;
use crate::types::{ModelCandidate, ProductionModelRecord, RunId};
use std::sync::Arc;

/// Versioned holder of the production model record.
///
/// History is append-only: every promotion or rollback adds a version and no
/// version is ever rewritten or deleted. Readers get an `Arc` snapshot that
/// stays valid however many swaps happen after it was taken.
pub trait ModelRegistry: Send + Sync {
    /// The record currently serving traffic.
    fn current(&self) -> Result<Arc<ProductionModelRecord>>;

    /// Register the first production model. Fails once any version exists.
    fn bootstrap(&self, candidate: &ModelCandidate) -> Result<Arc<ProductionModelRecord>>;

    /// Make `candidate` current if production is still at `expected_version`.
    fn promote(
        &self,
        expected_version: u64,
        candidate: &ModelCandidate,
        run_id: Option<RunId>,
    ) -> Result<Arc<ProductionModelRecord>>;

    /// Re-point production at an earlier version by appending a copy of it.
    fn rollback(&self, to_version: u64) -> Result<Arc<ProductionModelRecord>>;

    /// Fetch one version, current or historical.
    fn get(&self, version: u64) -> Result<Option<ProductionModelRecord>>;

    /// Every version, oldest first.
    fn history(&self) -> Result<Vec<ProductionModelRecord>>;
}
