//! Gateway configuration.
//!
//! Loaded once at startup from an optional YAML file; every section and field
//! falls back to its default. Durations are written as strings such as
//! `"1s"`, `"80ms"` or `"24h"`.

use std::path::Path;
use std::time::Duration;

use common::BackendConfig;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Which storage backend to construct and how.
    pub backend: BackendConfig,
    /// Write path: intake queue, tick cadence and batch delivery.
    pub pipeline: PipelineConfig,
    /// Read path: window validation and admission control.
    pub query: QueryConfig,
}

impl GatewayConfig {
    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.query.validate()
    }
}

/// Configuration of the batching pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the intake queue; producers wait when it is full.
    pub intake_capacity: usize,
    /// Capacity of the queue of completed batches awaiting delivery.
    pub dispatch_capacity: usize,
    /// How often the accumulator hands off its batch. Fixed for the
    /// lifetime of the process.
    #[serde(deserialize_with = "deserialize_duration")]
    pub tick_interval: Duration,
    /// Number of delivery workers. Each worker delivers in FIFO order.
    pub dispatch_workers: usize,
    pub retry: RetryPolicy,
    /// How many undeliverable batches are retained for inspection.
    pub dead_letter_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            intake_capacity: 100_000,
            dispatch_capacity: 5,
            tick_interval: Duration::from_secs(1),
            dispatch_workers: 1,
            retry: RetryPolicy::default(),
            dead_letter_capacity: 64,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.intake_capacity == 0 {
            return Err(Error::Config("pipeline.intake_capacity must be > 0".into()));
        }
        if self.dispatch_capacity == 0 {
            return Err(Error::Config("pipeline.dispatch_capacity must be > 0".into()));
        }
        if self.dispatch_workers == 0 {
            return Err(Error::Config("pipeline.dispatch_workers must be > 0".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("pipeline.tick_interval must be > 0".into()));
        }
        self.retry.validate()
    }
}

/// Bounded retry with exponential backoff for batch delivery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total delivery attempts per batch, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    #[serde(deserialize_with = "deserialize_duration")]
    pub initial_backoff: Duration,
    /// Upper bound for the delay between attempts.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_backoff: Duration,
    /// Deadline for a single `write_batch` call.
    #[serde(deserialize_with = "deserialize_duration")]
    pub write_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based): doubles each
    /// time, capped at `max_backoff`.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("pipeline.retry.max_attempts must be > 0".into()));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::Config("pipeline.retry.write_timeout must be > 0".into()));
        }
        Ok(())
    }
}

/// Configuration of the read path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Oldest permitted `start`, relative to now.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_query_age: Duration,
    /// Reads slower than this are logged as slow.
    #[serde(deserialize_with = "deserialize_duration")]
    pub slow_query_threshold: Duration,
    /// Longest a caller waits for the admission ticket.
    #[serde(deserialize_with = "deserialize_duration")]
    pub admission_timeout: Duration,
    /// Deadline for a single backend read.
    #[serde(deserialize_with = "deserialize_duration")]
    pub query_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_query_age: Duration::from_secs(24 * 3600),
            slow_query_threshold: Duration::from_millis(80),
            admission_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl QueryConfig {
    fn validate(&self) -> Result<()> {
        if self.admission_timeout.is_zero() || self.query_timeout.is_zero() {
            return Err(Error::Config("query timeouts must be > 0".into()));
        }
        Ok(())
    }
}

/// Load gateway configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

    let config: GatewayConfig = serde_yaml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Parse a duration string (e.g., "80ms", "1s", "5m", "24h").
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Config("Empty duration string".into()));
    }

    // Find where the numeric part ends
    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());

    if num_end == 0 {
        return Err(Error::Config(format!(
            "Duration must start with a number: {}",
            s
        )));
    }

    let value: f64 = s[..num_end]
        .parse()
        .map_err(|_| Error::Config(format!("Invalid duration number: {}", s)))?;
    let unit = &s[num_end..];

    let multiplier = match unit {
        "ns" => 1e-9,
        "us" => 1e-6,
        "ms" => 0.001,
        "s" | "" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86400.0,
        _ => {
            return Err(Error::Config(format!("Unknown duration unit: {}", unit)));
        }
    };

    Ok(Duration::from_secs_f64(value * multiplier))
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::milliseconds("80ms", 80)]
    #[case::seconds("1s", 1_000)]
    #[case::minutes("5m", 300_000)]
    #[case::hours("24h", 86_400_000)]
    #[case::no_unit("2", 2_000)]
    #[case::fractional_seconds("1.5s", 1_500)]
    fn should_parse_duration(#[case] input: &str, #[case] expected_millis: u128) {
        // when
        let result = parse_duration(input).unwrap();

        // then
        assert_eq!(result.as_millis(), expected_millis);
    }

    #[rstest]
    #[case::empty("")]
    #[case::invalid_unit("15x")]
    #[case::no_number("s")]
    fn should_fail_to_parse_invalid_duration(#[case] input: &str) {
        // when
        let result = parse_duration(input);

        // then
        assert!(result.is_err());
    }

    #[test]
    fn should_use_defaults_for_empty_config() {
        // given
        let yaml = "{}";

        // when
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(config.pipeline.intake_capacity, 100_000);
        assert_eq!(config.pipeline.dispatch_capacity, 5);
        assert_eq!(config.pipeline.tick_interval, Duration::from_secs(1));
        assert_eq!(config.pipeline.dispatch_workers, 1);
        assert_eq!(config.query.slow_query_threshold, Duration::from_millis(80));
        assert_eq!(config.query.max_query_age, Duration::from_secs(86_400));
        assert_eq!(config.backend, BackendConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_full_config() {
        // given
        let yaml = r#"
backend:
  type: slatedb
  downsample_buckets: 50
pipeline:
  intake_capacity: 1000
  tick_interval: 250ms
  dispatch_workers: 2
  retry:
    max_attempts: 3
    initial_backoff: 10ms
query:
  slow_query_threshold: 100ms
  admission_timeout: 2s
"#;

        // when
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(config.backend.kind, "slatedb");
        assert_eq!(config.backend.downsample_buckets, 50);
        assert_eq!(config.pipeline.intake_capacity, 1000);
        assert_eq!(config.pipeline.dispatch_capacity, 5);
        assert_eq!(config.pipeline.tick_interval, Duration::from_millis(250));
        assert_eq!(config.pipeline.dispatch_workers, 2);
        assert_eq!(config.pipeline.retry.max_attempts, 3);
        assert_eq!(
            config.pipeline.retry.initial_backoff,
            Duration::from_millis(10)
        );
        assert_eq!(config.pipeline.retry.max_backoff, Duration::from_secs(5));
        assert_eq!(config.query.slow_query_threshold, Duration::from_millis(100));
        assert_eq!(config.query.admission_timeout, Duration::from_secs(2));
    }

    #[test]
    fn should_reject_zero_capacity() {
        // given
        let yaml = r#"
pipeline:
  dispatch_capacity: 0
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();

        // when
        let result = config.validate();

        // then
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn should_double_backoff_up_to_cap() {
        // given
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        };

        // when
        let delays: Vec<Duration> = (1..=5).map(|n| policy.backoff(n)).collect();

        // then
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }
}
