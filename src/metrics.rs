//! Prometheus metrics collection for threadlock.
//!
//! Exposed on the keep-alive server's `/metrics` endpoint.
//!
//! - `threadlock_actions_total{action}` - audit entries written by action kind
//! - `threadlock_denials_total{reason}` - requests refused before any mutation
//! - `threadlock_gateway_errors_total{operation,kind}` - failed platform calls
//! - `threadlock_active_sessions` - confirmation prompts awaiting a decision
//! - `threadlock_action_duration_seconds{action}` - workflow latency

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Audit entries written, by action kind.
pub static ACTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Requests refused before any mutation, by reason.
pub static DENIALS: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed gateway calls by operation and error kind.
pub static GATEWAY_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Confirmation sessions currently awaiting Delete/Keep.
pub static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Workflow duration by action.
pub static ACTION_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Called once at startup. Recording before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(ACTIONS, IntCounterVec::new(Opts::new("threadlock_actions_total", "Thread moderation actions recorded"), &["action"]));
    register!(DENIALS, IntCounterVec::new(Opts::new("threadlock_denials_total", "Requests refused before any mutation"), &["reason"]));
    register!(GATEWAY_ERRORS, IntCounterVec::new(Opts::new("threadlock_gateway_errors_total", "Failed platform calls"), &["operation", "kind"]));
    register!(ACTIVE_SESSIONS, IntGauge::new("threadlock_active_sessions", "Confirmation prompts awaiting a decision"));
    register!(ACTION_LATENCY, HistogramVec::new(
        HistogramOpts::new("threadlock_action_duration_seconds", "Thread moderation workflow latency")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["action"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

#[inline]
pub fn record_action(action: &str) {
    if let Some(c) = ACTIONS.get() {
        c.with_label_values(&[action]).inc();
    }
}

#[inline]
pub fn record_denial(reason: &str) {
    if let Some(c) = DENIALS.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn record_gateway_error(operation: &str, kind: &str) {
    if let Some(c) = GATEWAY_ERRORS.get() {
        c.with_label_values(&[operation, kind]).inc();
    }
}

#[inline]
pub fn session_opened() {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.inc();
    }
}

#[inline]
pub fn session_closed() {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.dec();
    }
}

#[inline]
pub fn record_duration(action: &str, duration_secs: f64) {
    if let Some(h) = ACTION_LATENCY.get() {
        h.with_label_values(&[action]).observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_action("LOCK");
        record_gateway_error("lock", "forbidden");

        let output = gather_metrics();
        assert!(output.contains("threadlock_actions_total"));
        assert!(output.contains("threadlock_gateway_errors_total"));
    }
}
