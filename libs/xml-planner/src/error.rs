//! Error types for planning

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Raised before any row is fetched; no output is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("no element or attribute matches '{0}'")]
    UnresolvedPath(String),

    #[error("'{path}' is ambiguous across mapping classes: {}", candidates.join(", "))]
    AmbiguousPath {
        path: String,
        candidates: Vec<String>,
    },

    #[error("'{0}' does not render a bound column")]
    UnboundReference(String),

    #[error("column '{column}' referenced at {node} does not belong to any enclosing mapping class")]
    UnresolvedColumn { column: String, node: String },

    #[error("column reference '{0}' is not allowed in a query predicate; use a document path")]
    ColumnInPredicate(String),

    #[error("context scope '{scope}' is not an ancestor of '{target}'")]
    InvalidContext { scope: String, target: String },

    #[error("incompatible context scopes in one predicate: {first} and {second}")]
    IncompatibleContext { first: String, second: String },

    #[error("predicate '{0}' references mapping classes on different branches")]
    DisjointReferences(String),

    #[error("ORDER BY key '{0}' does not belong to a bound mapping class")]
    UnmappedOrderKey(String),

    #[error("row limit target '{0}' is not bound to a source")]
    UnboundRowLimit(String),

    #[error("conflicting row limits on {class}: {first} and {second}")]
    ConflictingRowLimit {
        class: String,
        first: String,
        second: String,
    },

    #[error("invalid row limit predicate '{0}': expected rowlimit(path) = <non-negative integer>")]
    InvalidRowLimit(String),

    #[error("invalid LIKE pattern '{0}'")]
    InvalidPattern(String),
}
