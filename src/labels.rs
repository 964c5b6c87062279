// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation and finalizer constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and the open-cluster-management
//! labels/finalizers to ensure consistency across all resources touched by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/managed-by` on resources created by this controller
pub const MANAGED_BY_IMPORT_CONTROLLER: &str = "managedcluster-import-controller";

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_OCM: &str = "open-cluster-management";

// ============================================================================
// Cluster Labels
// ============================================================================

/// Label added to every `ManagedCluster`, equal to its name
pub const NAME_LABEL: &str = "name";

/// Back-reference label on the cluster namespace, equal to the cluster name
pub const CLUSTER_LABEL: &str = "cluster.open-cluster-management.io/managedCluster";

/// Label marking the hub itself as a managed cluster; boolean-valued
pub const SELF_MANAGED_LABEL: &str = "local-cluster";

// ============================================================================
// Annotations
// ============================================================================

/// Annotation linking a token secret to its service account
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer owned by this controller on `ManagedCluster` and `ClusterDeployment`
pub const FINALIZER_MANAGED_CLUSTER: &str =
    "managedcluster-import-controller.open-cluster-management.io/cleanup";

/// Finalizer owned by the registration controller on `ManagedCluster`
pub const FINALIZER_REGISTRATION: &str = "cluster.open-cluster-management.io/api-resource-cleanup";
