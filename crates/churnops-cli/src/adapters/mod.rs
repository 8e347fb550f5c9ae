//! Filesystem and subprocess implementations of the retraining collaborators.

mod command;
mod dataset;
mod evaluator;
mod trainer;

pub use command::run_command;
pub use dataset::{parse_label, FsDatasetSource};
pub use evaluator::{read_predictions, PredictionsEvaluator};
pub use trainer::{sha256_file, CommandTrainer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has no column named {column:?}")]
    MissingColumn { path: String, column: String },

    #[error("{path} row {row}: cannot read {value:?} as a churn label")]
    BadLabel { path: String, row: u64, value: String },

    #[error("{path} row {row}: cannot read {value:?} as a probability")]
    BadProbability { path: String, row: u64, value: String },

    #[error("{0} contains no rows")]
    Empty(String),

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("no command configured")]
    NoCommand,
}

impl AdapterError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }
}
