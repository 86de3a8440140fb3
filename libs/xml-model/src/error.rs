//! Error types for mapping tree construction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("mapping document '{0}' declares no top-level element")]
    NoRootElement(String),

    #[error("attribute '{attribute}' must be a direct child of an element (found under {parent})")]
    MisplacedAttribute { attribute: String, parent: String },

    #[error("attribute '{0}' has neither a column binding nor a fixed value")]
    AttributeWithoutValue(String),

    #[error("criteria node under {0} must be a direct child of a choice node")]
    MisplacedCriteria(String),

    #[error("choice node at {0} may only contain criteria nodes")]
    InvalidChoiceChild(String),

    #[error("recursive element '{element}' names anchor '{anchor}' which is not an ancestor element")]
    UnknownAnchor { element: String, anchor: String },

    #[error("recursion anchor '{0}' is not bound to a source")]
    UnboundAnchor(String),

    #[error("node at {0} requires a bound source")]
    MissingSource(String),

    #[error("invalid cardinality at {path}: minOccurs={min}, maxOccurs={max}")]
    InvalidCardinality { path: String, min: u32, max: i64 },

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("invalid tree path '{0}'")]
    InvalidPath(String),
}
