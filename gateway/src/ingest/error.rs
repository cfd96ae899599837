/// Errors that can occur while handing measurements to the ingest pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The intake queue is full and the caller asked not to wait
    Backpressure,
    /// The pipeline has been stopped
    Shutdown,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Backpressure => write!(f, "intake queue is full, backpressure applied"),
            IngestError::Shutdown => write!(f, "ingest pipeline has been stopped"),
        }
    }
}

impl std::error::Error for IngestError {}

/// Result type for ingest operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
