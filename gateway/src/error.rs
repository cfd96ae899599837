//! Error types for the gateway.

use std::time::Duration;

use common::BackendError;
use thiserror::Error;

use crate::ingest::IngestError;

/// All errors surfaced by the gateway core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The request was rejected before reaching the pipeline or the backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The storage backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The measurement could not be handed to the ingest pipeline.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Waited too long for the query admission ticket.
    #[error("query admission timed out after {0:?}")]
    AdmissionTimeout(Duration),

    /// The backend read did not finish in time.
    #[error("query timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
