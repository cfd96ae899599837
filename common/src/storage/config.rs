//! Storage backend configuration types.
//!
//! A backend is selected by its registry name (`type`), so new variants can be
//! registered without touching this module. Settings specific to one variant
//! live in their own section and are ignored by the others.

use serde::{Deserialize, Serialize};

/// Registry name of the in-memory backend.
pub const IN_MEMORY: &str = "in_memory";

/// Registry name of the SlateDB backend.
pub const SLATEDB: &str = "slatedb";

/// Default number of buckets a windowed read is downsampled into.
pub const DEFAULT_DOWNSAMPLE_BUCKETS: usize = 100;

/// Top-level backend configuration.
///
/// Defaults to the in-memory backend with 100 downsampling buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Name of the registered backend to construct.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Number of buckets `read_interval` downsamples a window into.
    /// `0` disables downsampling.
    #[serde(default = "default_downsample_buckets")]
    pub downsample_buckets: usize,

    /// Settings for the `slatedb` backend.
    #[serde(default)]
    pub slatedb: SlateDbBackendConfig,
}

fn default_kind() -> String {
    IN_MEMORY.to_string()
}

fn default_downsample_buckets() -> usize {
    DEFAULT_DOWNSAMPLE_BUCKETS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            downsample_buckets: default_downsample_buckets(),
            slatedb: SlateDbBackendConfig::default(),
        }
    }
}

impl BackendConfig {
    /// Config selecting the named backend with default settings.
    pub fn named(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }
}

/// SlateDB-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlateDbBackendConfig {
    /// Path prefix for SlateDB data in the object store.
    #[serde(default = "default_slatedb_path")]
    pub path: String,

    /// Object store provider configuration.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,

    /// Optional path to a SlateDB settings file (TOML/YAML/JSON).
    ///
    /// If not provided, uses SlateDB's `Settings::load()` which checks the
    /// working directory and `SLATEDB_` prefixed environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,
}

fn default_slatedb_path() -> String {
    "measurements".to_string()
}

impl Default for SlateDbBackendConfig {
    fn default() -> Self {
        Self {
            path: default_slatedb_path(),
            object_store: ObjectStoreConfig::default(),
            settings_path: None,
        }
    }
}

/// Object store provider configuration for SlateDB.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ObjectStoreConfig {
    /// In-memory object store (useful for testing and development).
    #[default]
    InMemory,

    /// Local filesystem object store.
    Local(LocalObjectStoreConfig),
}

/// Local filesystem object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalObjectStoreConfig {
    /// Path to the local directory for storage.
    pub path: String,
}
