// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for cluster onboarding and offboarding.
//!
//! Benign absence is never an error here: lookups return `Option` and the
//! reconcilers branch on it. The variants below cover the remaining classes:
//!
//! - malformed evidence on the cluster or its secrets (fatal for the reconcile)
//! - blocking dependencies that resolve once their owner acts
//! - provisioning artifacts that are not ready yet
//! - cleanup failures for clusters that no longer exist, retried on a fixed delay
//!
//! Store failures are not wrapped: they travel through `anyhow` verbatim.

use thiserror::Error;

/// Errors raised while provisioning, importing or tearing down a managed cluster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The self-managed label holds something other than a boolean.
    #[error("ManagedCluster {cluster} has invalid value '{value}' for label local-cluster: expected a boolean")]
    MalformedSelfManagedLabel {
        /// Cluster carrying the label
        cluster: String,
        /// Raw label value
        value: String,
    },

    /// The namespace dedicated to the cluster does not exist.
    #[error("namespace {namespace} for ManagedCluster {namespace} not found")]
    NamespaceMissing {
        /// Namespace (and cluster) name
        namespace: String,
    },

    /// The namespace is still referenced by an external provisioning record.
    ///
    /// Not transient in the usual sense: it clears once hive removes the
    /// `ClusterDeployment`.
    #[error("can not delete namespace {namespace} as ClusterDeployment {namespace} still exist")]
    ClusterDeploymentStillExists {
        /// Namespace (and `ClusterDeployment`) name
        namespace: String,
    },

    /// The token controller has not populated the bootstrap token secret yet.
    #[error("bootstrap token secret {namespace}/{secret} has no token yet")]
    BootstrapTokenPending {
        /// Cluster namespace
        namespace: String,
        /// Token secret name
        secret: String,
    },

    /// A credential source carries neither a kubeconfig nor a token and server.
    #[error("{source_kind} {namespace}/{name} does not provide credentials for the managed cluster")]
    MissingCredentials {
        /// Kind of the credential source (`Secret`, `ClusterDeployment`)
        source_kind: String,
        /// Namespace of the source
        namespace: String,
        /// Name of the source
        name: String,
    },

    /// The auto-import secret carries an unparseable retry counter.
    #[error("auto-import secret {namespace}/auto-import-secret has invalid autoImportRetry '{value}'")]
    InvalidRetryCount {
        /// Cluster namespace
        namespace: String,
        /// Raw counter value
        value: String,
    },

    /// Namespace cleanup for a cluster that is already gone failed.
    ///
    /// Attached as context to the underlying failure so the error policy can
    /// pick the fixed retry delay.
    #[error("cleanup of namespace {namespace} for removed ManagedCluster failed")]
    OrphanCleanupFailed {
        /// Namespace (and former cluster) name
        namespace: String,
    },
}

#[cfg(test)]
#[path = "import_errors_tests.rs"]
mod import_errors_tests;
