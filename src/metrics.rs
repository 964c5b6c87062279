// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the import controller.
//!
//! All metrics carry the `managedcluster_import_` prefix and live in a
//! [`Registry`] owned by [`Metrics`]. The controller holds one [`Metrics`] in its
//! context and the HTTP server renders the same instance, so tests can build
//! isolated instances without sharing counters.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconcile outcomes, durations and requeues
//! - **Import Metrics** - direct import attempts by strategy and outcome
//! - **Leader Election Metrics** - leadership transitions
//!
//! # Example
//!
//! ```rust,no_run
//! use managedcluster_import::metrics::Metrics;
//!
//! let metrics = Metrics::new().unwrap();
//! metrics.record_reconciliation_success("ManagedCluster", std::time::Duration::from_secs(1));
//! println!("{}", metrics.gather().unwrap());
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "managedcluster_import";

/// Metric handles and the registry they are registered in.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    /// Reconciliations by resource type and status (`success`, `error`)
    reconciliations_total: CounterVec,

    /// Reconciliation duration by resource type
    reconciliation_duration_seconds: HistogramVec,

    /// Requeues by resource type and reason
    requeues_total: CounterVec,

    /// Direct import attempts by strategy (`hub`, `cluster_deployment`,
    /// `auto_import_secret`) and outcome (`success`, `failure`)
    imports_total: CounterVec,

    /// Leadership transitions (`acquired`, `lost`)
    leader_elections_total: CounterVec,

    /// 1 while this pod holds the lease
    leader_status: GaugeVec,
}

impl Metrics {
    /// Create and register all metrics in a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric definition is invalid or registered twice.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_reconciliations_total"),
                "Total number of reconciliations by resource type and status",
            ),
            &["resource_type", "status"],
        )?;
        let reconciliation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
                "Duration of reconciliations in seconds by resource type",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
            &["resource_type"],
        )?;
        let requeues_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_requeues_total"),
                "Total number of requeue operations by resource type and reason",
            ),
            &["resource_type", "reason"],
        )?;
        let imports_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_imports_total"),
                "Total number of direct import attempts by strategy and outcome",
            ),
            &["strategy", "outcome"],
        )?;
        let leader_elections_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_leader_elections_total"),
                "Total number of leader election transitions",
            ),
            &["event"],
        )?;
        let leader_status = GaugeVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_leader_status"),
                "Whether this pod currently holds the leader lease",
            ),
            &["pod_name"],
        )?;

        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(reconciliation_duration_seconds.clone()))?;
        registry.register(Box::new(requeues_total.clone()))?;
        registry.register(Box::new(imports_total.clone()))?;
        registry.register(Box::new(leader_elections_total.clone()))?;
        registry.register(Box::new(leader_status.clone()))?;

        Ok(Self {
            registry,
            reconciliations_total,
            reconciliation_duration_seconds,
            requeues_total,
            imports_total,
            leader_elections_total,
            leader_status,
        })
    }

    pub fn record_reconciliation_success(&self, resource_type: &str, duration: Duration) {
        self.reconciliations_total
            .with_label_values(&[resource_type, "success"])
            .inc();
        self.reconciliation_duration_seconds
            .with_label_values(&[resource_type])
            .observe(duration.as_secs_f64());
    }

    pub fn record_reconciliation_error(&self, resource_type: &str, duration: Duration) {
        self.reconciliations_total
            .with_label_values(&[resource_type, "error"])
            .inc();
        self.reconciliation_duration_seconds
            .with_label_values(&[resource_type])
            .observe(duration.as_secs_f64());
    }

    /// Record a requeue
    ///
    /// # Arguments
    /// * `resource_type` - The kind of resource
    /// * `reason` - Why it was requeued (`error`, `orphan_cleanup`)
    pub fn record_requeue(&self, resource_type: &str, reason: &str) {
        self.requeues_total
            .with_label_values(&[resource_type, reason])
            .inc();
    }

    pub fn record_import(&self, strategy: &str, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "failure" };
        self.imports_total
            .with_label_values(&[strategy, outcome])
            .inc();
    }

    pub fn record_leader_elected(&self, pod_name: &str) {
        self.leader_elections_total
            .with_label_values(&["acquired"])
            .inc();
        self.leader_status.with_label_values(&[pod_name]).set(1.0);
    }

    pub fn record_leader_lost(&self, pod_name: &str) {
        self.leader_elections_total.with_label_values(&["lost"]).inc();
        self.leader_status.with_label_values(&[pod_name]).set(0.0);
    }

    /// Gather and encode all metrics in Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
    }
}
