// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Teardown of a managed cluster and its namespace.
//!
//! The cluster namespace holds everything the hub keeps for a cluster, so
//! deleting it is the bulk of offboarding. It must not go while hive still has a
//! `ClusterDeployment` in it: hive needs the namespace to deprovision. In that
//! case the controller releases its finalizer on the deployment and reports the
//! block until hive removes it.

use super::finalizers::{foreign_finalizers, has_finalizer, remove_finalizers};
use crate::constants::DELETION_WAIT_REQUEUE_SECS;
use crate::context::Context;
use crate::crd::{ClusterDeployment, ManagedCluster, ManifestWork};
use crate::import::is_offline;
use crate::import::remote::RemoteApplier;
use crate::import_errors::ImportError;
use crate::labels::{FINALIZER_MANAGED_CLUSTER, FINALIZER_REGISTRATION};
use crate::manifests::RenderConfig;
use crate::store::{ObjectKey, ObjectStore};
use anyhow::Result;
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info};

/// Delete the namespace of a cluster unless hive still needs it.
///
/// Succeeds without writing when the namespace is gone or already terminating.
///
/// # Errors
///
/// Returns [`ImportError::ClusterDeploymentStillExists`] after releasing the
/// controller finalizer on a remaining `ClusterDeployment`, and propagates store
/// failures.
pub async fn delete_namespace<S>(store: &S, namespace: &str) -> Result<()>
where
    S: ObjectStore + ?Sized,
{
    let Some(ns) = store
        .get::<Namespace>(&ObjectKey::cluster_scoped(namespace))
        .await?
    else {
        info!("Namespace {} not found", namespace);
        return Ok(());
    };

    if ns.metadata.deletion_timestamp.is_some() {
        info!("Namespace {} already in deletion", namespace);
        return Ok(());
    }

    if let Some(deployment) = store
        .get::<ClusterDeployment>(&ObjectKey::namespaced(namespace, namespace))
        .await?
    {
        remove_finalizers(store, &deployment, &[FINALIZER_MANAGED_CLUSTER]).await?;
        return Err(ImportError::ClusterDeploymentStillExists {
            namespace: namespace.to_string(),
        }
        .into());
    }

    if store
        .delete::<Namespace>(&ObjectKey::cluster_scoped(namespace))
        .await?
    {
        info!("Deleted namespace {}", namespace);
    }
    Ok(())
}

/// Offboard a `ManagedCluster` that is being deleted.
///
/// The `ManifestWork` goes first. While finalizers owned by other controllers
/// remain the cluster is requeued; once only ours and the registration
/// finalizer are left, the namespace is cleaned up and the finalizers released.
/// The registration finalizer is only released for an offline cluster, whose
/// agent can no longer do it.
///
/// # Errors
///
/// Returns namespace cleanup errors and store failures.
pub async fn delete_managed_cluster<S, A>(
    ctx: &Context<S, A>,
    cluster: &ManagedCluster,
) -> Result<Action>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    let name = cluster.name_any();

    if !has_finalizer(cluster, FINALIZER_MANAGED_CLUSTER) {
        debug!(cluster = %name, "No controller finalizer, nothing to clean up");
        return Ok(Action::await_change());
    }

    let cfg = RenderConfig::for_cluster(&name);
    if ctx
        .store
        .delete::<ManifestWork>(&ObjectKey::namespaced(
            &cfg.cluster_namespace,
            &cfg.manifest_work_name(),
        ))
        .await?
    {
        info!(cluster = %name, "Deleted ManifestWork {}", cfg.manifest_work_name());
    }

    let waiting_on = foreign_finalizers(cluster, &[FINALIZER_MANAGED_CLUSTER, FINALIZER_REGISTRATION]);
    if !waiting_on.is_empty() {
        info!(
            cluster = %name,
            finalizers = ?waiting_on,
            "Waiting for other finalizers before cleaning up, requeueing in {}s",
            DELETION_WAIT_REQUEUE_SECS
        );
        return Ok(Action::requeue(Duration::from_secs(DELETION_WAIT_REQUEUE_SECS)));
    }

    delete_namespace(&ctx.store, &cfg.cluster_namespace).await?;

    let releasing: &[&str] = if is_offline(cluster) {
        &[FINALIZER_MANAGED_CLUSTER, FINALIZER_REGISTRATION]
    } else {
        &[FINALIZER_MANAGED_CLUSTER]
    };
    remove_finalizers(&ctx.store, cluster, releasing).await?;
    info!(cluster = %name, "ManagedCluster cleanup complete");

    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "deletion_tests.rs"]
mod deletion_tests;
