// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) used by the import controller.
//!
//! The controller does not own most of these APIs: they are published by the
//! registration, work and hive projects. Only the fields the controller reads or
//! writes are modeled; unknown fields are ignored on deserialization.
//!
//! # Resource Types
//!
//! - [`ManagedCluster`] - Hub-side registration of a remote cluster (cluster-scoped)
//! - [`ManifestWork`] - Manifests distributed to a reachable cluster
//! - [`ClusterDeployment`] - Record of a cluster provisioned by hive
//! - [`SyncSet`] - Legacy hive distribution mechanism, only ever deleted
//! - [`Klusterlet`] - Agent-side CRD shipped inside the import bundle
//!
//! # Example
//!
//! ```rust,no_run
//! use managedcluster_import::crd::{ManagedCluster, ManagedClusterSpec};
//!
//! let cluster = ManagedCluster::new(
//!     "prod-east",
//!     ManagedClusterSpec {
//!         hub_accepts_client: true,
//!         ..Default::default()
//!     },
//! );
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `ManagedClusterConditionAvailable`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// ManagedCluster
// ============================================================================

/// API server endpoint of a managed cluster as reported by its agent.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// URL of the managed cluster API server.
    pub url: String,

    /// Base64-encoded CA bundle for the API server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

/// `ManagedCluster` represents a remote cluster registered with the hub.
///
/// The cluster name doubles as the name of the dedicated hub namespace holding
/// all per-cluster resources.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    shortname = "mcl",
    doc = "ManagedCluster is the hub-side registration of a cluster under management."
)]
#[kube(status = "ManagedClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// Whether the hub accepts the registration request of the cluster agent.
    #[serde(default)]
    pub hub_accepts_client: bool,

    /// Lease duration in seconds used by the agent to report liveness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,

    /// API server endpoints of the managed cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_cluster_client_configs: Option<Vec<ClientConfig>>,
}

/// Kubernetes version reported by the managed cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManagedClusterVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<String>,
}

/// `ManagedCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManagedClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ManagedClusterVersion>,
}

// ============================================================================
// ManifestWork
// ============================================================================

/// Raw manifests carried by a `ManifestWork`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManifestsTemplate {
    #[serde(default)]
    pub manifests: Vec<serde_json::Value>,
}

/// `ManifestWork` holds the manifests the work agent applies on a managed cluster.
///
/// It lives in the cluster namespace on the hub and is replaced as a whole on
/// every update.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "work.open-cluster-management.io",
    version = "v1",
    kind = "ManifestWork",
    namespaced,
    doc = "ManifestWork is a set of manifests applied on a managed cluster."
)]
#[kube(status = "ManifestWorkStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default)]
    pub workload: ManifestsTemplate,
}

/// `ManifestWork` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct ManifestWorkStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// Hive
// ============================================================================

/// Reference to a secret in the same namespace.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

/// Metadata of an installed cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Secret holding the admin kubeconfig under the `kubeconfig` key.
    pub admin_kubeconfig_secret_ref: LocalObjectReference,
}

/// `ClusterDeployment` records a cluster provisioned by hive.
///
/// Its presence in a cluster namespace marks the cluster as externally provisioned.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "ClusterDeployment",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    #[serde(default)]
    pub cluster_name: String,

    /// Set by hive once installation completed.
    #[serde(default)]
    pub installed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_metadata: Option<ClusterMetadata>,
}

/// `SyncSet` is the legacy mechanism that used to ship the agent manifests.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(group = "hive.openshift.io", version = "v1", kind = "SyncSet", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct SyncSetSpec {
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
}

// ============================================================================
// Klusterlet
// ============================================================================

/// `Klusterlet` configures the agent running on a managed cluster.
///
/// Only its CRD and a single instance are rendered into the import bundle; the
/// hub never reads it back.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "operator.open-cluster-management.io",
    version = "v1",
    kind = "Klusterlet",
    doc = "Klusterlet configures the registration and work agents of a managed cluster."
)]
#[serde(rename_all = "camelCase")]
pub struct KlusterletSpec {
    /// Name the cluster registers under on the hub.
    pub cluster_name: String,

    /// Namespace on the managed cluster the agent is deployed into.
    pub namespace: String,

    /// Image of the registration agent.
    pub registration_image_pull_spec: String,

    /// Image of the work agent.
    pub work_image_pull_spec: String,
}
