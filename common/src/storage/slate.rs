//! SlateDB-backed storage backend.
//!
//! Each row becomes one key/value pair:
//!
//! ```text
//! key   = tag_len: u16 BE | tag | timestamp: u64 BE (sign bit flipped) | seq: u64 BE
//! value = count: u32 LE | count × f64 LE
//! ```
//!
//! Flipping the sign bit makes byte order match numeric order for negative
//! timestamps too, so a window read is a single key-range scan. The trailing
//! sequence keeps rows with equal timestamps distinct.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use slatedb::config::Settings;
use slatedb::object_store;
use slatedb::{Db, DbBuilder, WriteBatch};

use super::config::{ObjectStoreConfig, SLATEDB, SlateDbBackendConfig};
use super::downsample::last_per_bucket;
use super::{BackendError, BackendResult, StorageBackend, parse_command};
use crate::clock::{Clock, SystemClock};
use crate::model::Sample;
use crate::serde::{Batch, EncodingError, MAX_TAG_LEN, decode_values, encode_values};

/// SlateDB implementation of [`StorageBackend`].
///
/// SlateDB is an embedded LSM store on top of object storage. Writes of one
/// batch are applied atomically through a single `WriteBatch`.
pub struct SlateDbBackend {
    db: Arc<Db>,
    next_seq: AtomicU64,
    downsample_buckets: usize,
}

impl SlateDbBackend {
    /// Wraps an already opened database.
    pub fn new(db: Arc<Db>, downsample_buckets: usize) -> Self {
        // seed from the wall clock so sequences stay unique across restarts
        let seed = SystemClock.now_nanos().max(0) as u64;
        Self {
            db,
            next_seq: AtomicU64::new(seed),
            downsample_buckets,
        }
    }

    /// Opens SlateDB according to the configuration.
    pub async fn open(
        config: &SlateDbBackendConfig,
        downsample_buckets: usize,
    ) -> BackendResult<Self> {
        let object_store: Arc<dyn object_store::ObjectStore> = match &config.object_store {
            ObjectStoreConfig::InMemory => Arc::new(object_store::memory::InMemory::new()),
            ObjectStoreConfig::Local(local_config) => {
                std::fs::create_dir_all(&local_config.path).map_err(|e| {
                    BackendError::Config(format!(
                        "Failed to create storage directory '{}': {}",
                        local_config.path, e
                    ))
                })?;
                let store = object_store::local::LocalFileSystem::new_with_prefix(
                    &local_config.path,
                )
                .map_err(|e| {
                    BackendError::Config(format!(
                        "Failed to create local filesystem store: {}",
                        e
                    ))
                })?;
                Arc::new(store)
            }
        };

        let settings = match &config.settings_path {
            Some(path) => Settings::from_file(path).map_err(|e| {
                BackendError::Config(format!(
                    "Failed to load SlateDB settings from {}: {}",
                    path, e
                ))
            })?,
            None => Settings::load().unwrap_or_default(),
        };

        let db = DbBuilder::new(config.path.clone(), object_store)
            .with_settings(settings)
            .build()
            .await
            .map_err(|e| BackendError::Storage(format!("Failed to open SlateDB: {}", e)))?;

        tracing::info!(path = %config.path, "Opened SlateDB backend");
        Ok(Self::new(Arc::new(db), downsample_buckets))
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn window(&self, tag: &str, start: i64, end: i64) -> BackendResult<Vec<Sample>> {
        if end <= start {
            return Ok(Vec::new());
        }
        // (start, end] == [start + 1, end]
        let lower = encode_key(tag, start + 1, 0)?;
        let upper = encode_key(tag, end, u64::MAX)?;
        let mut iter = self
            .db
            .scan(lower..=upper)
            .await
            .map_err(BackendError::from_storage)?;

        let mut samples = Vec::new();
        while let Some(entry) = iter.next().await.map_err(BackendError::from_storage)? {
            let timestamp = decode_key_timestamp(&entry.key)?;
            let values = decode_values(&mut entry.value.as_ref())?;
            samples.push(Sample::new(timestamp, values));
        }
        Ok(samples)
    }
}

#[async_trait]
impl StorageBackend for SlateDbBackend {
    fn name(&self) -> &str {
        SLATEDB
    }

    async fn write_batch(&self, batch: &Batch) -> BackendResult<()> {
        let mut write = WriteBatch::new();
        for row in batch.rows() {
            let row = row?;
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let key = encode_key(&row.tag, row.timestamp, seq)?;
            let mut value = Vec::with_capacity(4 + row.values.len() * 8);
            encode_values(&row.values, &mut value)?;
            write.put(key, value);
        }
        self.db
            .write(write)
            .await
            .map_err(BackendError::from_storage)?;
        Ok(())
    }

    async fn read_interval(&self, tag: &str, start: i64, end: i64) -> BackendResult<Vec<Sample>> {
        let samples = self.window(tag, start, end).await?;
        Ok(last_per_bucket(samples, start, end, self.downsample_buckets))
    }

    async fn read_last_in_window(
        &self,
        tag: &str,
        start: i64,
        end: i64,
    ) -> BackendResult<Option<Sample>> {
        Ok(self.window(tag, start, end).await?.pop())
    }

    async fn raw_command(&self, command: &str) -> BackendResult<()> {
        match parse_command(command) {
            ("ping", None) => Ok(()),
            ("flush", None) => self.db.flush().await.map_err(BackendError::from_storage),
            _ => Err(BackendError::UnsupportedCommand(command.to_string())),
        }
    }

    async fn close(&self) -> BackendResult<()> {
        self.db.close().await.map_err(BackendError::from_storage)
    }
}

fn order_preserving(timestamp: i64) -> u64 {
    (timestamp as u64) ^ (1 << 63)
}

fn encode_key(tag: &str, timestamp: i64, seq: u64) -> Result<Vec<u8>, EncodingError> {
    let tag = tag.as_bytes();
    if tag.len() > MAX_TAG_LEN {
        return Err(EncodingError::new(format!(
            "Tag too long for key encoding: {} bytes",
            tag.len()
        )));
    }
    let mut key = Vec::with_capacity(2 + tag.len() + 16);
    key.extend_from_slice(&(tag.len() as u16).to_be_bytes());
    key.extend_from_slice(tag);
    key.extend_from_slice(&order_preserving(timestamp).to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    Ok(key)
}

fn decode_key_timestamp(key: &Bytes) -> Result<i64, EncodingError> {
    if key.len() < 2 {
        return Err(EncodingError::new("Key too short for tag length"));
    }
    let tag_len = u16::from_be_bytes([key[0], key[1]]) as usize;
    let offset = 2 + tag_len;
    if key.len() != offset + 16 {
        return Err(EncodingError::new(format!(
            "Unexpected key length: {} for tag length {}",
            key.len(),
            tag_len
        )));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&key[offset..offset + 8]);
    Ok((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}
