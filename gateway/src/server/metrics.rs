//! Prometheus HTTP metrics for the gateway server.

use axum::http::Method;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: u16,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            Method::HEAD => HttpMethod::Head,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for HTTP request latency histogram (without status, since status is unknown at start).
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

/// HTTP request metrics, registered into the gateway's registry.
pub struct HttpMetrics {
    /// Counter of HTTP requests.
    pub http_requests_total: Family<HttpLabelsWithStatus, Counter>,

    /// Histogram of HTTP request latency in seconds.
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,

    /// Gauge of currently in-flight requests.
    pub http_requests_in_flight: Gauge,
}

impl HttpMetrics {
    /// Create the HTTP metrics and register them with `registry`.
    pub fn register(registry: &mut Registry) -> Self {
        let http_requests_total = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests_total",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        // HTTP request duration histogram (buckets from 1ms to ~8s)
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;

    #[test]
    fn should_register_http_metrics_alongside_gateway_metrics() {
        // given
        let mut metrics = Metrics::new();

        // when
        let http = HttpMetrics::register(metrics.registry_mut());
        http.http_requests_total
            .get_or_create(&HttpLabelsWithStatus {
                method: HttpMethod::Post,
                endpoint: "/save".to_string(),
                status: 200,
            })
            .inc();

        // then
        let encoded = metrics.encode();
        assert!(encoded.contains("# HELP http_requests_total"));
        assert!(encoded.contains("# HELP gateway_batches_emitted"));
        assert!(encoded.contains("method=\"Post\""));
    }

    #[test]
    fn should_map_methods_to_label_values() {
        assert_eq!(HttpMethod::from(&Method::GET), HttpMethod::Get);
        assert_eq!(HttpMethod::from(&Method::POST), HttpMethod::Post);
        assert_eq!(HttpMethod::from(&Method::DELETE), HttpMethod::Other);
    }
}
