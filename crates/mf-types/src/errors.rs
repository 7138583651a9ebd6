use thiserror::Error;

use crate::dataset::JobStatus;

/// Main error type for the MetaFab system
#[derive(Error, Debug)]
pub enum MfError {
    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Refinement error: {0}")]
    Refinement(#[from] RefinementError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

}

/// Sweep definition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    #[error("Invalid parameter range '{name}': {message}")]
    InvalidParameterRange { name: String, message: String },

    #[error("Sweep too large: combination count over {axes} axes overflows")]
    TooLarge { axes: usize },
}

/// Density analysis errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid analysis grid: {message}")]
    InvalidGrid { message: String },
}

/// Errors surfaced by the result store / job queue collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Job insert failed: {message}")]
    InsertFailed { message: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Record not found: {id}")]
    NotFound { id: String },
}

/// Job lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Job is in terminal state {status} and cannot change")]
    TerminalState { status: JobStatus },

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Refinement pass errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefinementError {
    #[error("Observation fetch failed: {0}")]
    ObservationFetch(#[source] StoreError),

    #[error("Job insert failed: {0}")]
    JobInsert(#[source] StoreError),
}

/// Result type alias for MetaFab operations
pub type MfResult<T> = Result<T, MfError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::MfError::Config(format!($($arg)*))
    };
}
