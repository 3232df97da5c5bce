use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct VerdictLabels {
    pub verdict: VerdictKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum VerdictKind {
    Allow,
    Deny,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Central container for every Prometheus metric exposed by the authorizer.
pub struct Metrics {
    /// Decisions by final verdict.
    pub decisions_total: Family<VerdictLabels, Counter>,
    /// End-to-end decision latency.
    pub decision_duration_seconds: Histogram,
    /// Candidate-method authentication attempts against the identity service.
    pub authn_attempts_total: Counter,
    /// Identity data-plane transport failures.
    pub identity_errors_total: Counter,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let decisions_total = Family::<VerdictLabels, Counter>::default();
        registry.register(
            "authgate_decisions_total",
            "Authorization decisions by verdict",
            decisions_total.clone(),
        );

        let decision_duration_seconds = Histogram::new(exponential_buckets(0.005, 2.0, 12));
        registry.register(
            "authgate_decision_duration_seconds",
            "End-to-end decision latency in seconds",
            decision_duration_seconds.clone(),
        );

        let authn_attempts_total = Counter::default();
        registry.register(
            "authgate_authn_attempts_total",
            "Candidate-method authentication attempts",
            authn_attempts_total.clone(),
        );

        let identity_errors_total = Counter::default();
        registry.register(
            "authgate_identity_errors_total",
            "Identity data-plane call failures",
            identity_errors_total.clone(),
        );

        Self {
            decisions_total,
            decision_duration_seconds,
            authn_attempts_total,
            identity_errors_total,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`crate::AppState`].
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all authorizer metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }
}
