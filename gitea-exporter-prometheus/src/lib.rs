//! Prometheus probe exporter for Gitea.
//!
//! Each scrape of the probe endpoint names a configured target. The exporter
//! queries that Gitea server, builds a fresh metric registry from the results
//! and renders it in the OpenMetrics text format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   HTTP Server   │────>│     Prober      │────>│  Gitea Server   │
//! │ (/probe?target) │<────│ (ProbeMetrics)  │<────│   (/api/v1)     │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! gitea-exporter-prometheus --config targets.yaml --listen 0.0.0.0:9115
//! curl 'http://localhost:9115/probe?target=main'
//! ```
//!
//! # Configuration
//!
//! See [`config::TargetRegistry`] for the target file format.

pub mod config;
pub mod http;
pub mod metrics;
pub mod probe;

pub use config::{ConfigError, Target, TargetRegistry};
pub use http::{AppState, HttpServer, create_router};
pub use metrics::ProbeMetrics;
pub use probe::Prober;
