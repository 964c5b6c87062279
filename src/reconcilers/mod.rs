// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of `ManagedCluster` resources.
//!
//! # Reconciliation Architecture
//!
//! A reconcile request carries only a cluster name. The orchestrator fetches the
//! cluster and classifies its lifecycle state:
//!
//! 1. **Absent** - the cluster is gone; its namespace is cleaned up
//! 2. **Deleting** - the deletion pipeline offboards the cluster
//! 3. **Active** - the provisioning pipeline brings the cluster to its desired state
//!
//! Nothing is retried inside a reconcile. Errors are returned to the controller,
//! which requeues according to [`error_requeue`].
//!
//! # Available Reconcilers
//!
//! - [`reconcile_managed_cluster`] - Entry point for one cluster
//! - [`provisioning::provision_managed_cluster`] - Onboards an active cluster
//! - [`deletion::delete_managed_cluster`] - Offboards a terminating cluster
//! - [`deletion::delete_namespace`] - Removes a cluster namespace once hive is done with it
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use managedcluster_import::context::Context;
//! use managedcluster_import::reconcilers::reconcile_managed_cluster;
//!
//! async fn run(ctx: &Context) -> anyhow::Result<()> {
//!     let action = reconcile_managed_cluster(ctx, "prod-east").await?;
//!     println!("{action:?}");
//!     Ok(())
//! }
//! ```

pub mod deletion;
pub mod finalizers;
pub mod provisioning;
pub mod resources;
pub mod status;

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, ORPHAN_CLEANUP_REQUEUE_SECS};
use crate::context::Context;
use crate::crd::ManagedCluster;
use crate::import::remote::RemoteApplier;
use crate::import_errors::ImportError;
use crate::store::{ObjectKey, ObjectStore};
use anyhow::Result;
use kube::runtime::controller::Action;
use std::time::Duration;
use tracing::info;

/// Reconcile the `ManagedCluster` named `name`.
///
/// # Errors
///
/// Returns the error of the first failing step. A failed namespace cleanup for
/// an absent cluster carries [`ImportError::OrphanCleanupFailed`] as context.
pub async fn reconcile_managed_cluster<S, A>(ctx: &Context<S, A>, name: &str) -> Result<Action>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    let Some(cluster) = ctx
        .store
        .get::<ManagedCluster>(&ObjectKey::cluster_scoped(name))
        .await?
    else {
        info!("ManagedCluster {} not found, cleaning up its namespace", name);
        deletion::delete_namespace(&ctx.store, name)
            .await
            .map_err(|e| {
                e.context(ImportError::OrphanCleanupFailed {
                    namespace: name.to_string(),
                })
            })?;
        return Ok(Action::await_change());
    };

    if cluster.metadata.deletion_timestamp.is_some() {
        info!("ManagedCluster {} is being deleted", name);
        return deletion::delete_managed_cluster(ctx, &cluster).await;
    }

    info!("Reconciling ManagedCluster {}", name);
    provisioning::provision_managed_cluster(ctx, cluster).await
}

/// Whether the error came from cleaning up after an already removed cluster.
#[must_use]
pub fn is_orphan_cleanup_failure(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::OrphanCleanupFailed { .. })
    )
}

/// Retry delay for a failed reconcile.
///
/// Orphaned namespace cleanup has nothing else that would re-trigger it, so it
/// is retried on a fixed one-minute schedule.
#[must_use]
pub fn error_requeue(err: &anyhow::Error) -> Action {
    if is_orphan_cleanup_failure(err) {
        Action::requeue(Duration::from_secs(ORPHAN_CLEANUP_REQUEUE_SECS))
    } else {
        Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
    }
}
