//! Prometheus exposition for Core-B, served at `GET /metrics`.
//!
//! Names and label sets match the workspace spec's §6.4 metrics surface,
//! which in turn matches the `prometheus_client` counters/gauge in the
//! original Python `core_b/main.py` one-for-one.

use prometheus::{CounterVec, Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub requests_total: CounterVec,
    pub deception_events: CounterVec,
    pub crypto_errors: IntCounter,
    pub active_sessions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("aegis_requests_total", "Total Aegis requests"),
            &["status"],
        )
        .expect("static metric definition is valid");
        let deception_events = CounterVec::new(
            Opts::new(
                "aegis_deception_events",
                "Number of responses with a randomized outer status",
            ),
            &["fake_status"],
        )
        .expect("static metric definition is valid");
        let crypto_errors = IntCounter::new(
            "aegis_crypto_errors",
            "Decryption or crypto validation errors",
        )
        .expect("static metric definition is valid");
        let active_sessions = Gauge::new(
            "aegis_active_sessions",
            "Number of active crypto sessions",
        )
        .expect("static metric definition is valid");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("metric registration cannot fail for a freshly created registry");
        registry
            .register(Box::new(deception_events.clone()))
            .expect("metric registration cannot fail for a freshly created registry");
        registry
            .register(Box::new(crypto_errors.clone()))
            .expect("metric registration cannot fail for a freshly created registry");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("metric registration cannot fail for a freshly created registry");

        Self {
            registry,
            requests_total,
            deception_events,
            crypto_errors,
            active_sessions,
        }
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&metric_families, &mut buf)
            .expect("encoding a freshly gathered metric family set cannot fail");
        String::from_utf8(buf).expect("Prometheus text exposition is always valid UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
