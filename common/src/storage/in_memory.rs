//! In-memory storage backend.
//!
//! Keeps every row in a per-tag ordered map. Useful for tests and for running
//! the gateway without an external store.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::config::IN_MEMORY;
use super::downsample::last_per_bucket;
use super::{BackendError, BackendResult, StorageBackend, parse_command};
use crate::model::Sample;
use crate::serde::Batch;

/// Series key: timestamp first, then insertion sequence so duplicates survive.
type SeriesKey = (i64, u64);

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    series: RwLock<HashMap<String, BTreeMap<SeriesKey, Vec<f64>>>>,
    next_seq: AtomicU64,
    downsample_buckets: usize,
}

impl InMemoryBackend {
    pub fn new(downsample_buckets: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            downsample_buckets,
        }
    }

    /// Total number of stored rows across all tags.
    pub fn row_count(&self) -> usize {
        self.series
            .read()
            .map(|series| series.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    fn window(&self, tag: &str, start: i64, end: i64) -> BackendResult<Vec<Sample>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let series = self
            .series
            .read()
            .map_err(|_| BackendError::Storage("series lock poisoned".to_string()))?;
        let Some(points) = series.get(tag) else {
            return Ok(Vec::new());
        };
        let range = (
            Bound::Excluded((start, u64::MAX)),
            Bound::Included((end, u64::MAX)),
        );
        Ok(points
            .range(range)
            .map(|((ts, _), values)| Sample::new(*ts, values.clone()))
            .collect())
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &str {
        IN_MEMORY
    }

    async fn write_batch(&self, batch: &Batch) -> BackendResult<()> {
        // decode up front so a malformed batch is rejected as a whole
        let rows = batch.decode()?;
        let mut series = self
            .series
            .write()
            .map_err(|_| BackendError::Storage("series lock poisoned".to_string()))?;
        for row in rows {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            series
                .entry(row.tag)
                .or_default()
                .insert((row.timestamp, seq), row.values);
        }
        Ok(())
    }

    async fn read_interval(&self, tag: &str, start: i64, end: i64) -> BackendResult<Vec<Sample>> {
        let samples = self.window(tag, start, end)?;
        Ok(last_per_bucket(samples, start, end, self.downsample_buckets))
    }

    async fn read_last_in_window(
        &self,
        tag: &str,
        start: i64,
        end: i64,
    ) -> BackendResult<Option<Sample>> {
        Ok(self.window(tag, start, end)?.pop())
    }

    async fn raw_command(&self, command: &str) -> BackendResult<()> {
        let mut series = self
            .series
            .write()
            .map_err(|_| BackendError::Storage("series lock poisoned".to_string()))?;
        match parse_command(command) {
            ("ping", None) => Ok(()),
            ("clear", None) => {
                series.clear();
                Ok(())
            }
            ("drop", Some(tag)) => {
                series.remove(tag);
                Ok(())
            }
            _ => Err(BackendError::UnsupportedCommand(command.to_string())),
        }
    }
}
