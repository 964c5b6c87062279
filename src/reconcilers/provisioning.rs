// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provisioning of an active `ManagedCluster`.
//!
//! Steps run strictly in order and stop at the first failure. Every step is
//! idempotent, so the next reconcile resumes wherever this one stopped:
//!
//! 1. controller finalizer and `name` label, in a single metadata patch
//! 2. back-reference label on the cluster namespace
//! 3. bootstrap service account, created once and never updated
//! 4. bootstrap token secret and RBAC
//! 5. import bundle, stored as the `<cluster>-import` secret
//! 6. removal of legacy sync sets
//! 7. `ManifestWork` for a reachable cluster, or a direct import decision for an
//!    offline one

use super::finalizers::{add_finalizer, finalizers_patch};
use super::resources::{create_if_absent, upsert};
use super::status::record_import_condition;
use crate::constants::{INSTALL_PENDING_REQUEUE_SECS, LEGACY_SYNCSET_SUFFIXES};
use crate::context::Context;
use crate::crd::{ManagedCluster, SyncSet};
use crate::import::direct::{import_cluster, strategy_label};
use crate::import::remote::RemoteApplier;
use crate::import::{decide_import, is_offline};
use crate::import_errors::ImportError;
use crate::labels::{CLUSTER_LABEL, FINALIZER_MANAGED_CLUSTER, NAME_LABEL};
use crate::manifests::{self, ImportBundle, RenderConfig};
use crate::status_reasons::import_failure_context;
use crate::store::{ObjectKey, ObjectStore};
use anyhow::Result;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drive an active cluster to its provisioned state.
///
/// # Errors
///
/// Returns the first failing step's error. For a direct import, the import
/// error is returned after its outcome has been recorded on the cluster.
pub async fn provision_managed_cluster<S, A>(
    ctx: &Context<S, A>,
    cluster: ManagedCluster,
) -> Result<Action>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    let name = cluster.name_any();
    let cfg = RenderConfig::for_cluster(&name);

    let cluster = ensure_finalizer_and_label(&ctx.store, cluster).await?;
    ensure_namespace_label(&ctx.store, &cfg).await?;
    ensure_bootstrap_identity(&ctx.store, &cfg).await?;

    let bundle = ensure_import_secret(ctx, &cfg).await?;
    remove_legacy_sync_sets(&ctx.store, &cfg).await?;

    if !is_offline(&cluster) {
        info!(cluster = %name, "Cluster is available, distributing ManifestWork");
        upsert(&ctx.store, &manifests::manifest_work(&cfg, &bundle)).await?;
        return Ok(Action::await_change());
    }

    let decision = decide_import(&ctx.store, &cluster).await?;
    if !decision.should_import() {
        info!(cluster = %name, "Not importing offline cluster");
        return Ok(Action::await_change());
    }

    if decision.awaiting_install() {
        info!(
            cluster = %name,
            "ClusterDeployment not installed yet, requeueing in {}s",
            INSTALL_PENDING_REQUEUE_SECS
        );
        return Ok(Action::requeue(Duration::from_secs(
            INSTALL_PENDING_REQUEUE_SECS,
        )));
    }

    let result = import_cluster(ctx, &cluster, &decision, &bundle).await;
    ctx.metrics
        .record_import(strategy_label(&decision), result.is_ok());

    let recorded = record_import_condition(
        &ctx.store,
        &cluster,
        result.as_ref().err(),
        &import_failure_context(&name),
    )
    .await;

    match (result, recorded) {
        (Ok(action), Ok(())) => Ok(action),
        (Ok(_), Err(patch_error)) => Err(patch_error),
        (Err(import_error), Ok(())) => Err(import_error),
        (Err(import_error), Err(patch_error)) => {
            warn!(
                cluster = %name,
                error = %patch_error,
                "Failed to record import condition"
            );
            Err(import_error)
        }
    }
}

/// Add the controller finalizer and the `name` label, patching only if either was missing.
async fn ensure_finalizer_and_label<S>(store: &S, cluster: ManagedCluster) -> Result<ManagedCluster>
where
    S: ObjectStore,
{
    let name = cluster.name_any();
    let mut updated = cluster.clone();

    let finalizer_added = add_finalizer(&mut updated, FINALIZER_MANAGED_CLUSTER);
    let label_missing = !cluster.labels().contains_key(NAME_LABEL);
    if !finalizer_added && !label_missing {
        return Ok(cluster);
    }

    let mut patch = finalizers_patch(&cluster, updated.finalizers());
    if label_missing {
        patch["metadata"]["labels"] = json!({ NAME_LABEL: name });
    }

    info!(cluster = %name, "Adding finalizer and name label to ManagedCluster");
    store
        .merge_patch(&ObjectKey::cluster_scoped(&name), &patch)
        .await
}

async fn ensure_namespace_label<S>(store: &S, cfg: &RenderConfig) -> Result<()>
where
    S: ObjectStore,
{
    let key = ObjectKey::cluster_scoped(&cfg.cluster_namespace);
    let namespace: Namespace =
        store
            .get(&key)
            .await?
            .ok_or_else(|| ImportError::NamespaceMissing {
                namespace: cfg.cluster_namespace.clone(),
            })?;

    if namespace.labels().contains_key(CLUSTER_LABEL) {
        return Ok(());
    }

    let patch = json!({ "metadata": { "labels": { CLUSTER_LABEL: cfg.cluster_name } } });
    store.merge_patch::<Namespace>(&key, &patch).await?;
    info!("Labeled namespace {} with {}", key, CLUSTER_LABEL);
    Ok(())
}

async fn ensure_bootstrap_identity<S>(store: &S, cfg: &RenderConfig) -> Result<()>
where
    S: ObjectStore,
{
    create_if_absent(store, &manifests::bootstrap_service_account(cfg)).await?;
    upsert(store, &manifests::bootstrap_token_secret(cfg)).await?;
    upsert(store, &manifests::bootstrap_cluster_role(cfg)).await?;
    upsert(store, &manifests::bootstrap_cluster_role_binding(cfg)).await?;
    Ok(())
}

async fn ensure_import_secret<S, A>(ctx: &Context<S, A>, cfg: &RenderConfig) -> Result<ImportBundle>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    let token_secret: Option<Secret> = ctx
        .store
        .get(&ObjectKey::namespaced(
            &cfg.cluster_namespace,
            &cfg.bootstrap_token_secret_name(),
        ))
        .await?;
    let token = manifests::bootstrap_token(cfg, token_secret.as_ref())?;

    let bundle = manifests::import_bundle(cfg, &ctx.hub, &token)?;
    upsert(&ctx.store, &manifests::import_secret(cfg, &bundle)?).await?;
    debug!(cluster = %cfg.cluster_name, "Import secret up to date");
    Ok(bundle)
}

async fn remove_legacy_sync_sets<S>(store: &S, cfg: &RenderConfig) -> Result<()>
where
    S: ObjectStore,
{
    for suffix in LEGACY_SYNCSET_SUFFIXES {
        let key = ObjectKey::namespaced(
            &cfg.cluster_namespace,
            &format!("{}{suffix}", cfg.cluster_name),
        );
        if store.get::<SyncSet>(&key).await?.is_some() && store.delete::<SyncSet>(&key).await? {
            info!("Deleted legacy SyncSet {}", key);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "provisioning_tests.rs"]
mod provisioning_tests;
