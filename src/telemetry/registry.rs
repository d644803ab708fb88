//! Global metrics registry and metric handle definitions.

use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

use std::sync::LazyLock;

/// Global metrics instance. Initialized once, accessed from any call site.
static METRICS: LazyLock<Metrics> = LazyLock::new(Metrics::new);

/// All Prometheus metric handles for the ViberCode process.
///
/// Access via `Metrics::global()`. Metric handles are cheap to clone (Arc
/// internally) so call sites can grab references without threading state.
pub struct Metrics {
    pub(crate) registry: Registry,

    /// Total chat messages processed, by origin (terminal/websocket/agent).
    pub chat_messages_total: IntCounterVec,

    /// Total LLM completion calls, by outcome (ok/error/heuristic_fallback).
    pub llm_completions_total: IntCounterVec,

    /// LLM completion call duration in seconds.
    pub llm_completion_duration_seconds: Histogram,

    /// Currently connected WebSocket clients.
    pub ws_clients_connected: IntGauge,

    /// Total code-generation runs, by outcome (ok/error).
    pub generator_runs_total: IntCounterVec,

    /// Generator run duration in seconds, by database provider.
    pub generator_duration_seconds: HistogramVec,

    /// Currently running supervised projects.
    pub supervised_projects_running: IntGauge,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let chat_messages_total = IntCounterVec::new(
            Opts::new("vibercode_chat_messages_total", "Total chat messages processed"),
            &["origin"],
        )
        .expect("hardcoded metric descriptor");

        let llm_completions_total = IntCounterVec::new(
            Opts::new("vibercode_llm_completions_total", "Total LLM completion calls"),
            &["outcome"],
        )
        .expect("hardcoded metric descriptor");

        let llm_completion_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "vibercode_llm_completion_duration_seconds",
                "LLM completion call duration in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
        )
        .expect("hardcoded metric descriptor");

        let ws_clients_connected = IntGauge::new("vibercode_ws_clients_connected", "Currently connected WebSocket clients")
            .expect("hardcoded metric descriptor");

        let generator_runs_total = IntCounterVec::new(
            Opts::new("vibercode_generator_runs_total", "Total code-generation runs"),
            &["outcome"],
        )
        .expect("hardcoded metric descriptor");

        let generator_duration_seconds = HistogramVec::new(
            HistogramOpts::new("vibercode_generator_duration_seconds", "Generator run duration in seconds")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["db_provider"],
        )
        .expect("hardcoded metric descriptor");

        let supervised_projects_running = IntGauge::new(
            "vibercode_supervised_projects_running",
            "Currently running supervised projects",
        )
        .expect("hardcoded metric descriptor");

        registry.register(Box::new(chat_messages_total.clone())).expect("hardcoded metric");
        registry.register(Box::new(llm_completions_total.clone())).expect("hardcoded metric");
        registry
            .register(Box::new(llm_completion_duration_seconds.clone()))
            .expect("hardcoded metric");
        registry.register(Box::new(ws_clients_connected.clone())).expect("hardcoded metric");
        registry.register(Box::new(generator_runs_total.clone())).expect("hardcoded metric");
        registry.register(Box::new(generator_duration_seconds.clone())).expect("hardcoded metric");
        registry
            .register(Box::new(supervised_projects_running.clone()))
            .expect("hardcoded metric");

        Self {
            registry,
            chat_messages_total,
            llm_completions_total,
            llm_completion_duration_seconds,
            ws_clients_connected,
            generator_runs_total,
            generator_duration_seconds,
            supervised_projects_running,
        }
    }

    /// Access the global metrics instance.
    pub fn global() -> &'static Self {
        &METRICS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_registers_every_metric_exactly_once() {
        let metrics = Metrics::global();
        assert_eq!(metrics.registry.gather().len(), 7);
    }
}
