//! Shared building blocks for the measurement gateway.
//!
//! This crate holds everything the ingestion core and the storage backends
//! must agree on, without depending on either side:
//!
//! - **Model**: [`Measurement`] (one tagged, timestamped value vector) and
//!   [`Sample`] (one point returned by a read).
//! - **Batch codec**: [`Batch`] and [`BatchBuilder`], the append-only row
//!   encoding handed from the accumulator to a backend in a single call.
//! - **Storage capability**: the [`StorageBackend`] trait plus a
//!   [`BackendRegistry`] of named constructors, with in-memory and SlateDB
//!   reference implementations.
//! - **Clock**: an injectable wall clock for window validation.

pub mod clock;
pub mod model;
pub mod serde;
pub mod storage;

pub use clock::{Clock, MockClock, SystemClock};
pub use model::{Measurement, Sample};
pub use crate::serde::{Batch, BatchBuilder, EncodingError};
pub use storage::config::BackendConfig;
pub use storage::factory::BackendRegistry;
pub use storage::{BackendError, BackendResult, StorageBackend};
