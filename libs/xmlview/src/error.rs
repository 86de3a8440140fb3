//! Unified error type

use thiserror::Error;
use xmlview_engine::ProcessingError;
use xmlview_format::FormatError;
use xmlview_model::ModelError;
use xmlview_planner::PlannerError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid mapping: {0}")]
    Model(#[from] ModelError),

    #[error("planning failed: {0}")]
    Planner(#[from] PlannerError),

    #[error("production failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("serialization failed: {0}")]
    Format(#[from] FormatError),

    #[error("query could not be encoded: {0}")]
    Query(#[from] serde_json::Error),
}
