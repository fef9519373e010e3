// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Persona controller.
//!
//! All metrics use the namespace prefix `persona_firestoned_io_` (the
//! prometheus-safe form of `persona.firestoned.io`) and are exposed by the
//! `/metrics` HTTP endpoint started from `main`.

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all Persona metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "persona_firestoned_io";

/// Global Prometheus metrics registry, exposed via the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of syncs by outcome (`success` or `error`).
pub static SYNC_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_syncs_total"),
        "Total number of credential issuer syncs by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of syncs in seconds.
pub static SYNC_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_sync_duration_seconds"),
        "Duration of credential issuer syncs in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of serving certificates issued.
pub static CERTIFICATES_ISSUED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_certificates_issued_total"),
        "Total number of serving certificates issued",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of unexpected proxy server exits observed by the supervisor.
pub static PROXY_UNEXPECTED_EXITS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_proxy_unexpected_exits_total"),
        "Total number of unexpected proxy server exits",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a completed sync.
pub fn record_sync(success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "error" };
    SYNC_TOTAL.with_label_values(&[outcome]).inc();
    SYNC_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record the issuance of a serving certificate.
pub fn record_certificate_issued() {
    CERTIFICATES_ISSUED_TOTAL.inc();
}

/// Record an unexpected proxy exit.
pub fn record_proxy_unexpected_exit() {
    PROXY_UNEXPECTED_EXITS_TOTAL.inc();
}

/// Gather all registered metrics in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
