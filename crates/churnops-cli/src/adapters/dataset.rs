use churnops_core::{CollaboratorError, DatasetSource, DatasetSplit, LabeledDataset, SplitStrategy};
use csv::StringRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

use super::AdapterError;

/// Read a churn label. Accepts the Telco `Yes`/`No` strings as well as `1`/`0`.
pub fn parse_label(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "1" | "true" | "1.0" => Some(true),
        "no" | "0" | "false" | "0.0" => Some(false),
        _ => None,
    }
}

/// CSV dataset on local disk. Splits are written next to each other in `work_dir`.
pub struct FsDatasetSource {
    path: PathBuf,
    target_column: String,
    work_dir: PathBuf,
}

struct Table {
    headers: StringRecord,
    rows: Vec<(StringRecord, bool)>,
}

impl FsDatasetSource {
    pub fn new(path: impl Into<PathBuf>, target_column: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            target_column: target_column.into(),
            work_dir: work_dir.into(),
        }
    }

    fn read_table(&self, path: &Path) -> Result<Table, AdapterError> {
        let path_str = path.display().to_string();
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let target = headers
            .iter()
            .position(|h| h == self.target_column)
            .ok_or_else(|| AdapterError::MissingColumn {
                path: path_str.clone(),
                column: self.target_column.clone(),
            })?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let raw = record.get(target).unwrap_or("");
            let label = parse_label(raw).ok_or_else(|| AdapterError::BadLabel {
                path: path_str.clone(),
                row: i as u64 + 1,
                value: raw.to_string(),
            })?;
            rows.push((record, label));
        }
        if rows.is_empty() {
            return Err(AdapterError::Empty(path_str));
        }
        Ok(Table { headers, rows })
    }

    fn write_part(
        &self,
        name: &str,
        headers: &StringRecord,
        rows: &[&(StringRecord, bool)],
    ) -> Result<LabeledDataset, AdapterError> {
        std::fs::create_dir_all(&self.work_dir).map_err(|e| AdapterError::io(&self.work_dir, e))?;
        let path = self.work_dir.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(headers)?;
        for (record, _) in rows {
            writer.write_record(record)?;
        }
        writer.flush().map_err(|e| AdapterError::io(&path, e))?;

        Ok(LabeledDataset {
            location: path.display().to_string(),
            target_column: self.target_column.clone(),
            rows: rows.len() as u64,
            positive_rows: rows.iter().filter(|(_, label)| *label).count() as u64,
        })
    }
}

/// Number of rows of a group of `n` that go to the test part. At least one
/// row stays on each side whenever the group has two or more rows.
fn test_count(n: usize, fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    ((n as f64 * fraction).round() as usize).clamp(1, n - 1)
}

impl DatasetSource for FsDatasetSource {
    fn load(&self) -> Result<LabeledDataset, CollaboratorError> {
        let table = self.read_table(&self.path)?;
        Ok(LabeledDataset {
            location: self.path.display().to_string(),
            target_column: self.target_column.clone(),
            rows: table.rows.len() as u64,
            positive_rows: table.rows.iter().filter(|(_, label)| *label).count() as u64,
        })
    }

    /// Shuffle with a seeded RNG and cut; stratified splits cut each class separately.
    fn split(&self, dataset: &LabeledDataset, strategy: &SplitStrategy) -> Result<DatasetSplit, CollaboratorError> {
        let table = self.read_table(Path::new(&dataset.location))?;
        let mut rng = StdRng::seed_from_u64(strategy.seed);

        let groups: Vec<Vec<&(StringRecord, bool)>> = if strategy.stratify {
            vec![
                table.rows.iter().filter(|(_, label)| !*label).collect(),
                table.rows.iter().filter(|(_, label)| *label).collect(),
            ]
        } else {
            vec![table.rows.iter().collect()]
        };

        let mut train = Vec::new();
        let mut test = Vec::new();
        for mut group in groups {
            group.shuffle(&mut rng);
            let cut = test_count(group.len(), strategy.test_fraction);
            test.extend_from_slice(&group[..cut]);
            train.extend_from_slice(&group[cut..]);
        }

        Ok(DatasetSplit {
            train: self.write_part("train.csv", &table.headers, &train)?,
            test: self.write_part("test.csv", &table.headers, &test)?,
            strategy: strategy.clone(),
        })
    }
}
