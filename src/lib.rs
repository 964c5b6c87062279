// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # managedcluster-import - Hub-side cluster import controller
//!
//! A Kubernetes controller that onboards clusters registered with an Open
//! Cluster Management hub. For every `ManagedCluster` it provisions the hub-side
//! bootstrap identity, renders the agent import bundle, and delivers it: through
//! a `ManifestWork` when the cluster is reachable, or by applying it directly
//! when the cluster is offline and credentials are available.
//!
//! ## Modules
//!
//! - [`crd`] - Resource types for the kinds the controller reads and writes
//! - [`store`] - Object access with per-kind cached or authoritative reads
//! - [`manifests`] - Bootstrap resources and import bundle rendering
//! - [`import`] - Import decision engine and direct import
//! - [`reconcilers`] - Orchestrator, provisioning and deletion pipelines
//! - [`watch`] - Event filtering for the `ManifestWork` trigger stream
//! - [`context`] - Shared context handed to every reconcile
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use managedcluster_import::manifests::{import_bundle, HubSettings, RenderConfig};
//!
//! let cfg = RenderConfig::for_cluster("prod-east");
//! let hub = HubSettings {
//!     api_server_url: "https://hub.example.com:6443".to_string(),
//!     ..Default::default()
//! };
//! let bundle = import_bundle(&cfg, &hub, "bootstrap-token").unwrap();
//! println!("{}", bundle.import_yaml().unwrap());
//! ```

pub mod constants;
pub mod context;
pub mod crd;
pub mod import;
pub mod import_errors;
pub mod labels;
pub mod manifests;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;
pub mod store;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;
