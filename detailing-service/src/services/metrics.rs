//! Metrics collection and Prometheus export.
//!
//! HTTP request metrics are recorded through the `metrics` facade by the
//! service-core middleware; domain counters live in the `prometheus` default
//! registry. `/metrics` renders both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_counter_vec, CounterVec, IntCounterVec, TextEncoder};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Material taken from stock, by unit.
pub static MATERIAL_CONSUMED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "detailing_material_consumed_total",
        "Material taken from inventory",
        &["unit"]
    )
    .expect("Failed to register material_consumed_total")
});

pub static ROLLS_FINISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "detailing_rolls_finished_total",
        "Rolls moved to the finished list",
        &["category"]
    )
    .expect("Failed to register rolls_finished_total")
});

pub static INVOICES_GENERATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "detailing_invoices_generated_total",
        "Invoices issued",
        &["business", "source"] // job, manual
    )
    .expect("Failed to register invoices_generated_total")
});

pub static PAYMENTS_RECORDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "detailing_payments_recorded_total",
        "Payments recorded against jobs or invoices",
        &["mode"]
    )
    .expect("Failed to register payments_recorded_total")
});

pub static VERSION_CONFLICTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "detailing_version_conflicts_total",
        "Compare-and-swap writes that lost a race",
        &["document"]
    )
    .expect("Failed to register version_conflicts_total")
});

/// Install the HTTP metrics recorder and register domain counters.
///
/// Must be called once at startup, before any request is served.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    register_domain_metrics();
}

/// Force registration of the domain counters.
pub fn register_domain_metrics() {
    Lazy::force(&MATERIAL_CONSUMED_TOTAL);
    Lazy::force(&ROLLS_FINISHED_TOTAL);
    Lazy::force(&INVOICES_GENERATED_TOTAL);
    Lazy::force(&PAYMENTS_RECORDED_TOTAL);
    Lazy::force(&VERSION_CONFLICTS_TOTAL);
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut body = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    body.push_str(
        &encoder
            .encode_to_string(&prometheus::gather())
            .unwrap_or_default(),
    );
    body
}
