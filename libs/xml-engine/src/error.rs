//! Error types for execution

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Failure reported by a tuple source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("group '{group}' expects {expected} parameters, got {actual}")]
    ParameterCount {
        group: String,
        expected: usize,
        actual: usize,
    },

    #[error("access to '{group}' failed: {message}")]
    Failed { group: String, message: String },
}

/// Aborts the whole production; no partial document is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("row limit of {limit} exceeded for {node}")]
    RowLimitExceeded { node: String, limit: usize },

    #[error("recursion limit of {limit} exceeded for {node}")]
    RecursionLimitExceeded { node: String, limit: u32 },

    #[error("no branch of choice {0} matched")]
    NoMatchingBranch(String),

    #[error("{node} allows at most one occurrence but the source returned more")]
    TooManyOccurrences { node: String },

    #[error("column '{column}' is missing from the cursor of '{group}'")]
    MissingColumn { group: String, column: String },

    #[error(transparent)]
    DataAccess(#[from] SourceError),

    #[error("internal error: {0}")]
    Internal(String),
}
