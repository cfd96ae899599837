//! Prometheus metrics for the ingest pipeline and the query gate.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Counter of measurements accepted into the intake queue.
    pub measurements_received_total: Counter,

    /// Counter of measurements refused at intake (full or stopped).
    pub measurements_rejected_total: Counter,

    /// Counter of accepted measurements the accumulator could not encode.
    pub measurements_dropped_total: Counter,

    /// Counter of batches handed to the dispatch queue.
    pub batches_emitted_total: Counter,

    /// Counter of ticks that found nothing to hand off.
    pub empty_ticks_total: Counter,

    /// Histogram of rows per emitted batch.
    pub batch_rows: Histogram,

    /// Counter of batches the backend accepted.
    pub batches_written_total: Counter,

    /// Counter of measurements the backend accepted.
    pub measurements_written_total: Counter,

    /// Counter of failed delivery attempts that were retried.
    pub batch_write_retries_total: Counter,

    /// Counter of batches given up on after the last attempt.
    pub batches_dead_lettered_total: Counter,

    /// Gauge of dead letters currently retained.
    pub dead_letters: Gauge,

    /// Histogram of successful `write_batch` latency in seconds.
    pub batch_write_duration_seconds: Histogram,

    /// Gauge of callers waiting for the query gate.
    pub queries_waiting: Gauge,

    /// Histogram of backend read latency in seconds.
    pub query_duration_seconds: Histogram,

    /// Counter of reads slower than the configured threshold.
    pub slow_queries_total: Counter,

    /// Counter of callers that gave up waiting for the gate.
    pub query_admission_timeouts_total: Counter,

    /// Counter of reads cut off by the query deadline.
    pub query_timeouts_total: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let measurements_received_total = Counter::default();
        registry.register(
            "gateway_measurements_received_total",
            "Total number of measurements accepted into the intake queue",
            measurements_received_total.clone(),
        );

        let measurements_rejected_total = Counter::default();
        registry.register(
            "gateway_measurements_rejected_total",
            "Total number of measurements refused at intake",
            measurements_rejected_total.clone(),
        );

        let measurements_dropped_total = Counter::default();
        registry.register(
            "gateway_measurements_dropped_total",
            "Total number of accepted measurements dropped because they could not be encoded",
            measurements_dropped_total.clone(),
        );

        let batches_emitted_total = Counter::default();
        registry.register(
            "gateway_batches_emitted_total",
            "Total number of batches handed to the dispatch queue",
            batches_emitted_total.clone(),
        );

        let empty_ticks_total = Counter::default();
        registry.register(
            "gateway_empty_ticks_total",
            "Total number of ticks with no pending measurements",
            empty_ticks_total.clone(),
        );

        // Rows per batch (1 to ~260k)
        let batch_rows = Histogram::new(exponential_buckets(1.0, 4.0, 10));
        registry.register(
            "gateway_batch_rows",
            "Number of measurements per emitted batch",
            batch_rows.clone(),
        );

        let batches_written_total = Counter::default();
        registry.register(
            "gateway_batches_written_total",
            "Total number of batches written to the backend",
            batches_written_total.clone(),
        );

        let measurements_written_total = Counter::default();
        registry.register(
            "gateway_measurements_written_total",
            "Total number of measurements written to the backend",
            measurements_written_total.clone(),
        );

        let batch_write_retries_total = Counter::default();
        registry.register(
            "gateway_batch_write_retries_total",
            "Total number of batch writes that failed and were retried",
            batch_write_retries_total.clone(),
        );

        let batches_dead_lettered_total = Counter::default();
        registry.register(
            "gateway_batches_dead_lettered_total",
            "Total number of batches abandoned after exhausting retries",
            batches_dead_lettered_total.clone(),
        );

        let dead_letters = Gauge::default();
        registry.register(
            "gateway_dead_letters",
            "Number of undelivered batches retained in the dead letter store",
            dead_letters.clone(),
        );

        // Buckets from 1ms to ~8s
        let batch_write_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "gateway_batch_write_duration_seconds",
            "Latency of successful batch writes in seconds",
            batch_write_duration_seconds.clone(),
        );

        let queries_waiting = Gauge::default();
        registry.register(
            "gateway_queries_waiting",
            "Number of queries waiting for admission",
            queries_waiting.clone(),
        );

        let query_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "gateway_query_duration_seconds",
            "Latency of backend reads in seconds",
            query_duration_seconds.clone(),
        );

        let slow_queries_total = Counter::default();
        registry.register(
            "gateway_slow_queries_total",
            "Total number of reads slower than the slow query threshold",
            slow_queries_total.clone(),
        );

        let query_admission_timeouts_total = Counter::default();
        registry.register(
            "gateway_query_admission_timeouts_total",
            "Total number of queries that timed out waiting for admission",
            query_admission_timeouts_total.clone(),
        );

        let query_timeouts_total = Counter::default();
        registry.register(
            "gateway_query_timeouts_total",
            "Total number of backend reads that exceeded the query timeout",
            query_timeouts_total.clone(),
        );

        Self {
            registry,
            measurements_received_total,
            measurements_rejected_total,
            measurements_dropped_total,
            batches_emitted_total,
            empty_ticks_total,
            batch_rows,
            batches_written_total,
            measurements_written_total,
            batch_write_retries_total,
            batches_dead_lettered_total,
            dead_letters,
            batch_write_duration_seconds,
            queries_waiting,
            query_duration_seconds,
            slow_queries_total,
            query_admission_timeouts_total,
            query_timeouts_total,
        }
    }

    /// Returns a mutable reference to the underlying Prometheus registry.
    ///
    /// Use this to register additional metrics (e.g. HTTP metrics) before
    /// wrapping `Metrics` in an `Arc`.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}
