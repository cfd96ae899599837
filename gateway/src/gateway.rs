//! The gateway service shared by every transport handler.

use std::sync::Arc;
use std::time::Duration;

use common::serde::MAX_TAG_LEN;
use common::{Clock, Measurement, Sample, StorageBackend};

use crate::admission::QueryGate;
use crate::config::QueryConfig;
use crate::error::{Error, Result};
use crate::ingest::IngestHandle;
use crate::metrics::Metrics;
use crate::model::{QueryResult, SeriesRequest};

/// Write and read entry points.
///
/// Writes go to the ingest pipeline and are acknowledged once queued. Reads
/// are validated against the clock, then run through the [`QueryGate`].
pub struct Gateway {
    ingest: IngestHandle,
    backend: Arc<dyn StorageBackend>,
    gate: QueryGate,
    clock: Arc<dyn Clock>,
    max_query_age: Duration,
    metrics: Arc<Metrics>,
}

impl Gateway {
    pub fn new(
        ingest: IngestHandle,
        backend: Arc<dyn StorageBackend>,
        config: &QueryConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ingest,
            backend,
            gate: QueryGate::new(config, metrics.clone()),
            clock,
            max_query_age: config.max_query_age,
            metrics,
        }
    }

    /// Queues a measurement for storage, waiting while intake is full.
    pub async fn save(&self, measurement: Measurement) -> Result<()> {
        if measurement.tag.len() > MAX_TAG_LEN {
            return Err(Error::InvalidInput(format!("'tag' exceeds {} bytes", MAX_TAG_LEN)));
        }
        match self.ingest.submit(measurement).await {
            Ok(()) => {
                self.metrics.measurements_received_total.inc();
                Ok(())
            }
            Err(err) => {
                self.metrics.measurements_rejected_total.inc();
                Err(err.into())
            }
        }
    }

    /// Reads the downsampled series for a window.
    pub async fn series(&self, request: &SeriesRequest) -> Result<QueryResult> {
        self.validate_window(request.start, request.end)?;
        let label = format!(
            "series tag={} start={} end={}",
            request.tag, request.start, request.end
        );
        let samples = self
            .gate
            .run(&label, self.backend.read_interval(&request.tag, request.start, request.end))
            .await?;
        Ok(QueryResult {
            tag: request.tag.clone(),
            start: request.start,
            end: request.end,
            samples,
        })
    }

    /// The last stored sample of `tag` in `(start, end]`, if any.
    pub async fn interval_sample(&self, tag: &str, start: i64, end: i64) -> Result<Option<Sample>> {
        self.validate_window(start, end)?;
        let label = format!("interval_sample tag={} start={} end={}", tag, start, end);
        self.gate
            .run(&label, self.backend.read_last_in_window(tag, start, end))
            .await
    }

    /// Rejects windows that start too far in the past or end before they start.
    pub fn validate_window(&self, start: i64, end: i64) -> Result<()> {
        let max_age = i64::try_from(self.max_query_age.as_nanos()).unwrap_or(i64::MAX);
        let earliest = self.clock.now_nanos().saturating_sub(max_age);
        if start < earliest {
            return Err(Error::InvalidInput(format!(
                "'start' should be max {} from now",
                format_age(self.max_query_age)
            )));
        }
        if end < start {
            return Err(Error::InvalidInput("'end' must not be before 'start'".to_string()));
        }
        Ok(())
    }
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{:?}", age)
    }
}
