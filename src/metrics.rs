//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Bot update metrics
    pub static ref UPDATES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("webbridge_updates_total", "Total number of inbound bot updates"),
        &["kind"]
    ).expect("metric can be created");

    // Authorization metrics
    pub static ref REGISTRATIONS_TOTAL: IntCounter = IntCounter::new(
        "webbridge_registrations_total",
        "Total number of newly registered users"
    ).expect("metric can be created");
    pub static ref AUTHORIZATION_CHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("webbridge_authorization_changes_total", "Total number of authorize/deauthorize actions"),
        &["action"]
    ).expect("metric can be created");

    // Fan-out metrics
    pub static ref WS_SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "webbridge_ws_sessions_active",
        "Current number of connected web sessions"
    ).expect("metric can be created");
    pub static ref PUSHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("webbridge_pushes_total", "Total number of push payloads published"),
        &["outcome"]
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("webbridge_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(UPDATES_TOTAL.clone()))
        .expect("UPDATES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(REGISTRATIONS_TOTAL.clone()))
        .expect("REGISTRATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTHORIZATION_CHANGES_TOTAL.clone()))
        .expect("AUTHORIZATION_CHANGES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(WS_SESSIONS_ACTIVE.clone()))
        .expect("WS_SESSIONS_ACTIVE can be registered");
    REGISTRY
        .register(Box::new(PUSHES_TOTAL.clone()))
        .expect("PUSHES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
