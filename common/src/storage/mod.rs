//! Storage backend capability.
//!
//! The gateway never speaks a backend's query dialect. It depends only on
//! [`StorageBackend`]: bulk batch writes, windowed reads that the backend has
//! already downsampled, a last-sample lookup for verification, and a raw
//! command escape hatch for setup work.
//!
//! Concrete variants are created by name through the
//! [`BackendRegistry`](factory::BackendRegistry).

pub mod config;
pub mod downsample;
pub mod factory;
pub mod in_memory;
pub mod slate;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Sample;
use crate::serde::{Batch, EncodingError};

/// Errors reported by a storage backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The underlying store failed or is unreachable.
    #[error("storage error: {0}")]
    Storage(String),

    /// A batch or stored record could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The backend does not understand the raw command.
    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    /// No constructor is registered under the requested name.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// The backend configuration is invalid.
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Wraps any displayable store error as [`BackendError::Storage`].
    pub fn from_storage(e: impl std::fmt::Display) -> Self {
        BackendError::Storage(e.to_string())
    }
}

impl From<EncodingError> for BackendError {
    fn from(err: EncodingError) -> Self {
        BackendError::Encoding(err.message)
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// The contract the ingestion core requires from a time-series store.
///
/// Read windows are half-open on the left: a sample belongs to
/// `(start, end]` when `start < timestamp <= end`. Samples returned by
/// [`read_interval`](StorageBackend::read_interval) must be ordered by
/// ascending timestamp.
///
/// Implementations are shared across workers as `Arc<dyn StorageBackend>`
/// and must tolerate concurrent writes. Concurrent reads are serialized by
/// the caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Registry name of this variant.
    fn name(&self) -> &str;

    /// Inserts every row of the batch. The backend decides durability.
    async fn write_batch(&self, batch: &Batch) -> BackendResult<()>;

    /// Returns the downsampled samples of `tag` within `(start, end]`.
    async fn read_interval(&self, tag: &str, start: i64, end: i64) -> BackendResult<Vec<Sample>>;

    /// Returns the latest sample of `tag` within `(start, end]`, if any.
    async fn read_last_in_window(
        &self,
        tag: &str,
        start: i64,
        end: i64,
    ) -> BackendResult<Option<Sample>>;

    /// Executes a backend-specific administrative command.
    ///
    /// Every backend answers `ping`.
    async fn raw_command(&self, command: &str) -> BackendResult<()>;

    /// Releases backend resources. Called once at shutdown.
    async fn close(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Splits a raw command into its verb and optional argument.
pub(crate) fn parse_command(command: &str) -> (&str, Option<&str>) {
    let command = command.trim();
    match command.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, Some(arg.trim())),
        None => (command, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare("ping", "ping", None)]
    #[case::padded("  flush \n", "flush", None)]
    #[case::with_argument("drop  sensor-1 ", "drop", Some("sensor-1"))]
    fn should_split_raw_command(
        #[case] input: &str,
        #[case] verb: &str,
        #[case] arg: Option<&str>,
    ) {
        // when
        let parsed = parse_command(input);

        // then
        assert_eq!(parsed, (verb, arg));
    }

    #[test]
    fn should_convert_encoding_error() {
        // given
        let err = EncodingError::new("truncated row");

        // when
        let backend_err = BackendError::from(err);

        // then
        assert_eq!(backend_err, BackendError::Encoding("truncated row".to_string()));
    }
}
