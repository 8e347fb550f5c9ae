use crate::error::{ChurnOpsError, MetricsRole, Result};
use crate::registry::traits::ModelRegistry;
use crate::types::{ModelCandidate, ProductionModelRecord, RecordChange, RunId};
use chrono::Utc;
use redb::{AccessGuard, Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

// Table definitions
const VERSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("model_versions");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
/// v1 = bincode `ProductionModelRecord` per version, current pointer in meta
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";
const CURRENT_VERSION_KEY: &str = "current_version";

enum Append<'a> {
    Bootstrap(&'a ModelCandidate),
    Promote {
        expected_version: u64,
        candidate: &'a ModelCandidate,
        run_id: Option<RunId>,
    },
    Rollback { to_version: u64 },
}

/// Redb-backed model registry.
///
/// The current record is cached behind an `RwLock<Option<Arc<_>>>` and the
/// pointer is replaced only after the redb transaction has committed, so a
/// reader sees either the old record or the new one, never a mix.
pub struct RedbRegistry {
    db: Arc<Database>,
    path: PathBuf,
    current: RwLock<Option<Arc<ProductionModelRecord>>>,
    /// Serializes appends so the cache swap happens in commit order.
    write_lock: Mutex<()>,
}

impl RedbRegistry {
    /// Open or create a registry at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if is_new {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(VERSIONS)?;
                let mut meta = write_txn.open_table(META)?;
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
            write_txn.commit()?;
        } else {
            Self::check_schema_version(&db)?;
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(VERSIONS)?;
                let _ = write_txn.open_table(META)?;
            }
            write_txn.commit()?;
        }

        let current = Self::load_current(&db)?.map(Arc::new);
        if let Some(record) = &current {
            log::info!(
                "Registry {:?} opened at v{} ({})",
                path,
                record.version,
                record.model_id
            );
        }

        Ok(Self {
            db: Arc::new(db),
            path,
            current: RwLock::new(current),
            write_lock: Mutex::new(()),
        })
    }

    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table
                .and_then(|t| {
                    t.get(SCHEMA_VERSION_KEY)
                        .ok()
                        .flatten()
                        .and_then(|v| std::str::from_utf8(v.value()).ok().and_then(|s| s.parse::<u32>().ok()))
                })
                .unwrap_or(CURRENT_SCHEMA_VERSION)
        };

        match version.cmp(&CURRENT_SCHEMA_VERSION) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Less => Err(ChurnOpsError::Validation(format!(
                "Registry schema v{} is older than current v{}.",
                version, CURRENT_SCHEMA_VERSION
            ))),
            std::cmp::Ordering::Greater => Err(ChurnOpsError::Validation(format!(
                "Registry schema v{} is newer than this binary v{}. Upgrade churnops.",
                version, CURRENT_SCHEMA_VERSION
            ))),
        }
    }

    fn load_current(db: &Database) -> Result<Option<ProductionModelRecord>> {
        let read_txn = db.begin_read()?;
        let meta = read_txn.open_table(META)?;
        let versions = read_txn.open_table(VERSIONS)?;
        let Some(version) = parse_version(meta.get(CURRENT_VERSION_KEY)?) else {
            return Ok(None);
        };
        match versions.get(version)? {
            Some(bytes) => Ok(Some(Self::deserialize_record(bytes.value())?)),
            None => Err(ChurnOpsError::Validation(format!(
                "Registry points at v{} but that version is missing",
                version
            ))),
        }
    }

    /// Shared handle, so the tracking log can live in the same file.
    pub fn database(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn serialize_record(record: &ProductionModelRecord) -> Result<Vec<u8>> {
        bincode::serialize(record).map_err(ChurnOpsError::from)
    }

    fn deserialize_record(bytes: &[u8]) -> Result<ProductionModelRecord> {
        bincode::deserialize(bytes).map_err(ChurnOpsError::from)
    }

    /// Append one version and move the current pointer to it, in one transaction.
    fn append(&self, op: Append<'_>) -> Result<Arc<ProductionModelRecord>> {
        // Only metrics in [0, 1] may become production.
        match &op {
            Append::Bootstrap(candidate) | Append::Promote { candidate, .. } => {
                candidate.metrics.validate(MetricsRole::Candidate)?;
            }
            Append::Rollback { .. } => {}
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let write_txn = self.db.begin_write()?;
        let record = {
            let mut meta = write_txn.open_table(META)?;
            let mut versions = write_txn.open_table(VERSIONS)?;

            let current = match parse_version(meta.get(CURRENT_VERSION_KEY)?) {
                Some(v) => match versions.get(v)? {
                    Some(bytes) => Some(Self::deserialize_record(bytes.value())?),
                    None => return Err(ChurnOpsError::VersionNotFound(v)),
                },
                None => None,
            };
            let next = versions.last()?.map(|(k, _)| k.value() + 1).unwrap_or(1);

            let record = match op {
                Append::Bootstrap(candidate) => {
                    if let Some(current) = &current {
                        return Err(ChurnOpsError::AlreadyBootstrapped { version: current.version });
                    }
                    ProductionModelRecord::from_candidate(next, candidate, None, RecordChange::Bootstrap)
                }
                Append::Promote { expected_version, candidate, run_id } => {
                    let current = current.ok_or(ChurnOpsError::NoProductionModel)?;
                    if current.version != expected_version {
                        return Err(ChurnOpsError::StaleProductionVersion {
                            expected: expected_version,
                            actual: current.version,
                        });
                    }
                    ProductionModelRecord::from_candidate(next, candidate, run_id, RecordChange::Promotion)
                }
                Append::Rollback { to_version } => {
                    let current = current.ok_or(ChurnOpsError::NoProductionModel)?;
                    if current.version == to_version {
                        return Err(ChurnOpsError::Validation(format!(
                            "v{} is already the production model",
                            to_version
                        )));
                    }
                    let target = match versions.get(to_version)? {
                        Some(bytes) => Self::deserialize_record(bytes.value())?,
                        None => return Err(ChurnOpsError::VersionNotFound(to_version)),
                    };
                    ProductionModelRecord {
                        version: next,
                        model_id: target.model_id,
                        artifact: target.artifact,
                        metrics: target.metrics,
                        recorded_at: Utc::now(),
                        run_id: target.run_id,
                        change: RecordChange::Rollback {
                            from_version: current.version,
                            to_version,
                        },
                    }
                }
            };

            versions.insert(record.version, Self::serialize_record(&record)?.as_slice())?;
            meta.insert(CURRENT_VERSION_KEY, record.version.to_string().as_bytes())?;
            record
        };
        write_txn.commit()?;

        let record = Arc::new(record);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        log::info!(
            "Production model is now v{} ({}, {})",
            record.version,
            record.model_id,
            record.change
        );
        Ok(record)
    }
}

fn parse_version(bytes: Option<AccessGuard<'_, &'static [u8]>>) -> Option<u64> {
    bytes.and_then(|v| std::str::from_utf8(v.value()).ok().and_then(|s| s.parse::<u64>().ok()))
}

impl ModelRegistry for RedbRegistry {
    fn current(&self) -> Result<Arc<ProductionModelRecord>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ChurnOpsError::NoProductionModel)
    }

    fn bootstrap(&self, candidate: &ModelCandidate) -> Result<Arc<ProductionModelRecord>> {
        self.append(Append::Bootstrap(candidate))
    }

    fn promote(
        &self,
        expected_version: u64,
        candidate: &ModelCandidate,
        run_id: Option<RunId>,
    ) -> Result<Arc<ProductionModelRecord>> {
        self.append(Append::Promote { expected_version, candidate, run_id })
    }

    fn rollback(&self, to_version: u64) -> Result<Arc<ProductionModelRecord>> {
        self.append(Append::Rollback { to_version })
    }

    fn get(&self, version: u64) -> Result<Option<ProductionModelRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VERSIONS)?;
        match table.get(version)? {
            Some(bytes) => Ok(Some(Self::deserialize_record(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn history(&self) -> Result<Vec<ProductionModelRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VERSIONS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, bytes) = entry?;
            records.push(Self::deserialize_record(bytes.value())?);
        }
        Ok(records)
    }
}
