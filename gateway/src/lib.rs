//! Measurement ingestion gateway.
//!
//! Accepts individual measurements over HTTP, groups them into batches on a
//! fixed tick and delivers each batch to a pluggable storage backend in a
//! single call. Reads are windowed, backend-downsampled queries that pass
//! through a single-ticket admission gate, so at most one read is in flight
//! against the backend at any time.
//!
//! # Architecture
//!
//! - **[`IngestPipeline`]**: the batch accumulator (one task) and the batch
//!   dispatcher (a small worker pool), connected by bounded queues. Delivery
//!   failures are retried with exponential backoff; exhausted batches go to
//!   the dead letter store.
//! - **[`QueryGate`]**: serializes backend reads, with separate admission and
//!   query timeouts.
//! - **[`Gateway`]**: the service both transport handlers call into.
//! - **`server`** (feature `http-server`): the axum front.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use common::{BackendConfig, BackendRegistry, Measurement, SystemClock};
//! use gateway::{Gateway, GatewayConfig, IngestPipeline, Metrics, SeriesRequest};
//!
//! let config = GatewayConfig::default();
//! let backend = BackendRegistry::with_defaults().create(&config.backend).await?;
//! let metrics = Arc::new(Metrics::new());
//!
//! let mut pipeline = IngestPipeline::new(&config.pipeline, backend.clone(), metrics.clone());
//! pipeline.start();
//! let gateway = Gateway::new(pipeline.handle(), backend, &config.query, Arc::new(SystemClock), metrics);
//!
//! gateway.save(Measurement::new(now, "cpu", vec![0.5])).await?;
//! let result = gateway.series(&SeriesRequest::new("cpu", now - 60_000_000_000, now)).await?;
//! ```

mod admission;
mod config;
mod error;
mod gateway;
pub mod ingest;
mod metrics;
mod model;
#[cfg(feature = "http-server")]
pub mod server;

pub use admission::QueryGate;
pub use config::{
    GatewayConfig, PipelineConfig, QueryConfig, RetryPolicy, load_config, parse_duration,
};
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use ingest::{DeadLetter, DeadLetterStore, IngestError, IngestHandle, IngestPipeline};
pub use metrics::Metrics;
pub use model::{QueryResult, SeriesRequest};
