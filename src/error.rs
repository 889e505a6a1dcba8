#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

use crate::species::Species;

pub type Result<T> = std::result::Result<T, AtomError>;

#[derive(Error, Debug)]
pub enum AtomError {
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Lines, collisions or cross sections refer to a level that was never
    /// registered: levels must be ingested first.
    #[error(
        "Ordering violation: {data_source} references level_index {level_index} of {species}, \
         which is not among the ingested levels"
    )]
    OrderingViolation {
        species: Species,
        data_source: String,
        level_index: i64,
    },

    #[error("Unsupported collision transition type: ttype={0}")]
    UnsupportedTransitionType(i64),

    #[error("Unrecognized format for `{table}` table: {columns} columns ({names})")]
    UnrecognizedFormat {
        table: String,
        columns: usize,
        names: String,
    },

    #[error("Missing priority for {data_source} levels of {species}")]
    MissingPriority { data_source: String, species: Species },

    #[error("Priority tie for {species}: {first} and {second} both declare priority {priority}")]
    PriorityTie {
        species: Species,
        first: String,
        second: String,
        priority: i64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

#[cfg(feature = "python")]
impl From<AtomError> for PyErr {
    fn from(err: AtomError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for AtomError {
    fn from(err: PyErr) -> Self {
        AtomError::InvalidData(err.to_string())
    }
}
