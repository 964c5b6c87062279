// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the import controller.
//!
//! This module contains the numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Controller Identity
// ============================================================================

/// Field manager used for server-side apply and patches issued by this controller
pub const FIELD_MANAGER: &str = "managedcluster-import-controller";

/// Name of the leader election lease
pub const LEADER_LEASE_NAME: &str = "managedcluster-import-controller";

/// Kind name used in logs and metrics for the primary resource
pub const KIND_MANAGED_CLUSTER: &str = "ManagedCluster";

// ============================================================================
// Well-Known Resource Names
// ============================================================================

/// Suffix appended to the cluster name to form the bootstrap service account name
pub const BOOTSTRAP_SERVICE_ACCOUNT_SUFFIX: &str = "-bootstrap-sa";

/// Suffix appended to the bootstrap service account name to form its token secret name
pub const BOOTSTRAP_TOKEN_SECRET_SUFFIX: &str = "-token";

/// Suffix appended to the cluster name to form the import secret name
pub const IMPORT_SECRET_SUFFIX: &str = "-import";

/// Suffix appended to the cluster name to form the `ManifestWork` name
pub const MANIFEST_WORK_SUFFIX: &str = "-klusterlet";

/// Legacy sync-set suffixes removed during migration to `ManifestWork`
pub const LEGACY_SYNCSET_SUFFIXES: [&str; 2] = ["-klusterlet-crds", "-klusterlet"];

/// Name of the auto-import retry secret, looked up in the cluster namespace
pub const AUTO_IMPORT_SECRET_NAME: &str = "auto-import-secret";

/// Prefix of the bootstrap `ClusterRole` and `ClusterRoleBinding` names
pub const BOOTSTRAP_CLUSTER_ROLE_PREFIX: &str = "system:open-cluster-management:managedcluster:bootstrap:";

// ============================================================================
// Secret Data Keys
// ============================================================================

/// Import secret key holding the CRD documents
pub const IMPORT_SECRET_CRDS_KEY: &str = "crds.yaml";

/// Import secret key holding the import manifest documents
pub const IMPORT_SECRET_IMPORT_KEY: &str = "import.yaml";

/// Key holding a kubeconfig in credential secrets
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Key holding a bearer token in credential secrets
pub const TOKEN_KEY: &str = "token";

/// Key holding an API server URL in the auto-import secret
pub const SERVER_KEY: &str = "server";

/// Key holding the remaining retry budget in the auto-import secret
pub const AUTO_IMPORT_RETRY_KEY: &str = "autoImportRetry";

/// Retry budget used when the auto-import secret does not carry one
pub const DEFAULT_AUTO_IMPORT_RETRY: u32 = 5;

// ============================================================================
// Agent-Side Resources
// ============================================================================

/// Namespace the agent runs in on the managed cluster
pub const AGENT_NAMESPACE: &str = "open-cluster-management-agent";

/// Service account the agent operator runs as on the managed cluster
pub const AGENT_SERVICE_ACCOUNT: &str = "klusterlet";

/// Secret carrying the hub bootstrap kubeconfig on the managed cluster
pub const AGENT_BOOTSTRAP_SECRET: &str = "bootstrap-hub-kubeconfig";

/// Name of the `Klusterlet` resource created on the managed cluster
pub const KLUSTERLET_NAME: &str = "klusterlet";

// ============================================================================
// Condition Types
// ============================================================================

/// Condition type reported by the registration agent when the cluster is reachable
pub const CONDITION_AVAILABLE: &str = "ManagedClusterConditionAvailable";

/// Condition type recording the outcome of a direct import attempt
pub const CONDITION_IMPORT_SUCCEEDED: &str = "ManagedClusterImportSucceeded";

/// Condition status values
pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";
pub const STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration after a failed namespace cleanup for an already removed cluster (1 minute)
pub const ORPHAN_CLEANUP_REQUEUE_SECS: u64 = 60;

/// Requeue duration while an external provisioning record is not yet installed (1 minute)
pub const INSTALL_PENDING_REQUEUE_SECS: u64 = 60;

/// Requeue duration while foreign finalizers block deletion (10 seconds)
pub const DELETION_WAIT_REQUEUE_SECS: u64 = 10;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election grace period (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Remote Client Constants
// ============================================================================

/// Connect timeout for clients built against a managed cluster (5 seconds)
pub const REMOTE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Read timeout for clients built against a managed cluster (30 seconds)
pub const REMOTE_READ_TIMEOUT_SECS: u64 = 30;
