//! Plan domain errors

use thiserror::Error;

use super::store::StoreError;

/// Errors produced by the ordering engine and the plan service
///
/// `NotFound` is benign for delete (the entry is already gone) and an error
/// for move/update. `Forbidden` is raised by the household access check
/// before any mutation reaches the engine.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("internal failure: {0}")]
    Internal(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
