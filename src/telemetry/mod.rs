//! Prometheus metrics, gated behind the `metrics` Cargo feature (spec §11.2).

pub mod registry;
pub mod server;

pub use registry::Metrics;
pub use server::start_metrics_server;
