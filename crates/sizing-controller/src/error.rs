//! Controller error types.

use thiserror::Error;

/// Errors that abort a single evaluation cycle. None of them stop the
/// controller loop.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to list managed clusters: {0}")]
    ListClusters(anyhow::Error),

    #[error("state store error: {0}")]
    State(#[from] sizing_state::StateError),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
