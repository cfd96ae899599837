//! HTTP front for the gateway.
//!
//! | Route          | Behavior                                              |
//! |----------------|-------------------------------------------------------|
//! | `POST /save`   | decode a measurement and queue it, `OK` when accepted |
//! | `GET /api`     | windowed, downsampled series for a tag                |
//! | `GET /health`  | constant `OK`                                         |
//! | `GET /metrics` | Prometheus text exposition                            |
//!
//! Any other path answers 404 `Unsupported path`.

mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod middleware;
mod request;

pub use config::{CliArgs, GatewayServerConfig};
pub use error::ApiError;
pub use handlers::AppState;
pub use http::{GatewayServer, router};
pub use metrics::HttpMetrics;
