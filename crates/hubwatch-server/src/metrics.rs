//! Prometheus metrics for the hubwatch server.

use crate::types::ConnectionStatus;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for check result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CheckLabels {
    /// Resulting status (online, offline, error)
    pub status: String,
}

/// Labels for status transition metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TransitionLabels {
    pub from: String,
    pub to: String,
}

/// Labels for error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Error type (sweep, persist, publish)
    pub error_type: String,
}

/// Metrics registry with all hubwatch metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    /// Controller checks by resulting status
    checks_total: Family<CheckLabels, Counter>,
    /// Per-controller check duration
    check_duration_seconds: Histogram,
    /// Status transitions
    transitions_total: Family<TransitionLabels, Counter>,
    /// Controllers seen by the last sweep
    controllers: Gauge,
    /// Sweep duration
    sweep_duration_seconds: Histogram,
    /// Errors by type
    errors_total: Family<ErrorLabels, Counter>,
    /// Discovery calls
    discovery_runs_total: Counter,
    /// Candidates returned per discovery call
    discovery_candidates: Histogram,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let checks_total = Family::<CheckLabels, Counter>::default();
        registry.register(
            "hubwatch_checks",
            "Total controller checks performed",
            checks_total.clone(),
        );

        // Exponential buckets from 10ms to ~40s
        let check_duration_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 13));
        registry.register(
            "hubwatch_check_duration_seconds",
            "Controller check duration in seconds",
            check_duration_seconds.clone(),
        );

        let transitions_total = Family::<TransitionLabels, Counter>::default();
        registry.register(
            "hubwatch_status_transitions",
            "Total controller status transitions",
            transitions_total.clone(),
        );

        let controllers = Gauge::default();
        registry.register(
            "hubwatch_controllers",
            "Controllers checked by the most recent sweep",
            controllers.clone(),
        );

        let sweep_duration_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 15));
        registry.register(
            "hubwatch_sweep_duration_seconds",
            "Duration of a full sweep over all controllers",
            sweep_duration_seconds.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "hubwatch_errors",
            "Errors by type",
            errors_total.clone(),
        );

        let discovery_runs_total = Counter::default();
        registry.register(
            "hubwatch_discovery_runs",
            "Total discovery scans",
            discovery_runs_total.clone(),
        );

        let discovery_candidates =
            Histogram::new([0.0, 1.0, 2.0, 4.0, 8.0, 16.0].into_iter());
        registry.register(
            "hubwatch_discovery_candidates",
            "Candidates returned per discovery scan",
            discovery_candidates.clone(),
        );

        Self {
            registry,
            checks_total,
            check_duration_seconds,
            transitions_total,
            controllers,
            sweep_duration_seconds,
            errors_total,
            discovery_runs_total,
            discovery_candidates,
        }
    }

    /// Record one controller check
    pub fn record_check(&self, status: ConnectionStatus, duration: Duration) {
        self.checks_total
            .get_or_create(&CheckLabels {
                status: status.to_string(),
            })
            .inc();
        self.check_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Record a status transition
    pub fn record_transition(&self, from: ConnectionStatus, to: ConnectionStatus) {
        self.transitions_total
            .get_or_create(&TransitionLabels {
                from: from.to_string(),
                to: to.to_string(),
            })
            .inc();
    }

    /// Record a completed sweep
    pub fn record_sweep(&self, controllers: usize, duration: Duration) {
        self.controllers.set(controllers as i64);
        self.sweep_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Record an error by type
    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .get_or_create(&ErrorLabels {
                error_type: error_type.to_string(),
            })
            .inc();
    }

    /// Record a discovery scan
    pub fn record_discovery(&self, candidates: usize) {
        self.discovery_runs_total.inc();
        self.discovery_candidates.observe(candidates as f64);
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
