//! # alertplot-server
//!
//! Alertmanager webhook receiver that charts the condition behind each alert
//! and posts the chart to chat.
//!
//! For every alert the server recovers the alerting expression from its
//! generator URL, splits it into threshold conditions, re-queries Prometheus
//! over the alert's firing window, renders a chart with the threshold band
//! and hands the stored PNG to a notifier.
//!
//! ## Example
//!
//! ```rust,no_run
//! use alertplot_server::{AlertplotServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default()
//!         .with_prometheus_url("http://prometheus:9090")
//!         .with_public_url("https://alertplot.example.com");
//!
//!     let server = AlertplotServer::new(config).unwrap();
//!     // server.serve().await.unwrap();
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/healthz` | GET | Liveness probe |
//! | `/webhook` | POST | Alertmanager webhook receiver |
//! | `/images/{name}` | GET | Stored charts |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod payload;
pub mod pipeline;
pub mod plot;
pub mod prometheus;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

// Re-export main types
pub use config::{ServerConfig, SlackConfig};
pub use error::{NotifyError, PipelineError, QueryError, ServerError, ServerResult, StoreError};
pub use notify::{ConfiguredNotifier, LogNotifier, Message, MessageTemplate, Notifier, SlackNotifier};
pub use payload::{HookAlert, HookMessage};
pub use pipeline::{AlertOutcome, Pipeline};
pub use plot::plot_expression;
pub use prometheus::{MetricSource, PrometheusClient};
pub use server::AlertplotServer;
pub use state::AppState;
pub use store::{FileImageStore, ImageStore};
