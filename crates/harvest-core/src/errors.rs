//! Error types for the harvest core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Top-level error enum for the harvest core library.
///
/// Per-file variants (`Parse`, `Encoding`) and per-record `MalformedRecord`
/// are counted and skipped by the pipeline; the rest abort a run.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Encoding error: {path} is not valid UTF-8")]
    Encoding { path: String },

    #[error("Malformed record {method_name} in {path}: end line {end_line} precedes start line {start_line}")]
    MalformedRecord {
        path: String,
        method_name: String,
        start_line: usize,
        end_line: usize,
    },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All {attempted} repositories failed")]
    AllRepositoriesFailed { attempted: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HarvestError {
    /// True for failures that only cost one file (or one record) of output.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            HarvestError::Parse { .. }
                | HarvestError::Encoding { .. }
                | HarvestError::MalformedRecord { .. }
        )
    }
}

#[cfg(feature = "python")]
impl From<HarvestError> for PyErr {
    fn from(err: HarvestError) -> PyErr {
        match &err {
            HarvestError::Parse { .. }
            | HarvestError::Encoding { .. }
            | HarvestError::MalformedRecord { .. }
            | HarvestError::Config(_)
            | HarvestError::Json(_)
            | HarvestError::Toml(_) => PyValueError::new_err(err.to_string()),
            HarvestError::Io(_) | HarvestError::Csv(_) => PyIOError::new_err(err.to_string()),
            HarvestError::Collaborator(_)
            | HarvestError::AllRepositoriesFailed { .. }
            | HarvestError::Sqlite(_) => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
