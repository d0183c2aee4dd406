//! Prometheus metrics for the restgate server.
//!
//! Counts repository and blob operations, WORM rejections, storage failures,
//! and authentication outcomes.
//!
//! # Security Note
//!
//! The `/-/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Labels carry blob types and token user names but never repository names or
//! blob names. The endpoint is disabled by default; when enabled it MUST be
//! network-restricted to authorized scrapers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Repository gateway metrics
pub static BLOB_OPERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "restgate_blob_operations_total",
            "Total successful object operations by operation and blob type",
        ),
        &["operation", "blob_type"],
    )
    .expect("metric creation failed")
});

pub static BYTES_WRITTEN: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "restgate_bytes_written_total",
        "Total bytes written to the storage backend",
    )
    .expect("metric creation failed")
});

pub static WORM_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "restgate_worm_rejections_total",
            "Total requests rejected by write-once enforcement",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static STORAGE_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "restgate_storage_errors_total",
            "Total storage backend failures by operation",
        ),
        &["operation"],
    )
    .expect("metric creation failed")
});

pub static REPOSITORIES_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "restgate_repositories_created_total",
        "Total number of repositories created",
    )
    .expect("metric creation failed")
});

// Authentication metrics

/// Requests that passed authentication, by token `user` claim.
///
/// One series per distinct `user` ever presented, so cardinality is bounded
/// by the set of users tokens are issued for. Issue tokens for a fixed set of
/// operator-chosen user names, never per-host or per-run identifiers.
pub static AUTHENTICATED_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "restgate_authenticated_requests_total",
            "Total authenticated requests by token user",
        ),
        &["user"],
    )
    .expect("metric creation failed")
});

pub static AUTH_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "restgate_auth_failures_total",
            "Total rejected credentials by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(BLOB_OPERATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_WRITTEN.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(WORM_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STORAGE_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(REPOSITORIES_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTHENTICATED_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTH_FAILURES.clone()))
            .expect("metric registration failed");
    });
}

/// GET /-/metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

pub fn record_blob_operation(operation: &str, blob_type: &str) {
    BLOB_OPERATIONS
        .with_label_values(&[operation, blob_type])
        .inc();
}

pub fn record_bytes_written(bytes: usize) {
    BYTES_WRITTEN.inc_by(bytes as u64);
}

pub fn record_worm_rejection(reason: &str) {
    WORM_REJECTIONS.with_label_values(&[reason]).inc();
}

pub fn record_storage_error(operation: &str) {
    STORAGE_ERRORS.with_label_values(&[operation]).inc();
}

pub fn record_authenticated(user: &str) {
    AUTHENTICATED_REQUESTS.with_label_values(&[user]).inc();
}

pub fn record_auth_failure(reason: &str) {
    AUTH_FAILURES.with_label_values(&[reason]).inc();
}
