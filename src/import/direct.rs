// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Direct import: pushing the bundle to a cluster that cannot pull it.

use super::remote::{ImportTarget, RemoteApplier};
use super::ImportDecision;
use crate::constants::{
    AUTO_IMPORT_RETRY_KEY, DEFAULT_AUTO_IMPORT_RETRY, ERROR_REQUEUE_DURATION_SECS,
    INSTALL_PENDING_REQUEUE_SECS,
    KUBECONFIG_KEY, SERVER_KEY, TOKEN_KEY,
};
use crate::context::Context;
use crate::crd::{ClusterDeployment, ManagedCluster};
use crate::import_errors::ImportError;
use crate::manifests::ImportBundle;
use crate::store::{ObjectKey, ObjectStore};
use anyhow::{Context as _, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Metric label of the strategy behind a decision.
#[must_use]
pub fn strategy_label(decision: &ImportDecision) -> &'static str {
    match decision {
        ImportDecision::SelfManaged(_) => "hub",
        ImportDecision::ExternallyProvisioned(_) => "cluster_deployment",
        ImportDecision::AutoImportCandidate(_) => "auto_import_secret",
        ImportDecision::NoImport => "none",
    }
}

/// Apply the import bundle according to `decision`.
///
/// A `ClusterDeployment` that has not finished installing requeues the cluster
/// without error. An auto-import secret is consumed on success; on failure its
/// retry budget is decremented and, once exhausted, the secret is deleted. The
/// budget is validated before any attempt is made. Failing to consume the secret
/// after a successful import does not fail the import; the cluster is requeued.
///
/// # Errors
///
/// Returns the import failure, credential errors, or store failures.
pub async fn import_cluster<S, A>(
    ctx: &Context<S, A>,
    cluster: &ManagedCluster,
    decision: &ImportDecision,
    bundle: &ImportBundle,
) -> Result<Action>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    let name = cluster.name_any();

    match decision {
        ImportDecision::SelfManaged(true) => {
            info!(cluster = %name, "Importing self-managed cluster into the hub");
            ctx.applier.apply(&ImportTarget::Hub, bundle).await?;
            Ok(Action::await_change())
        }
        ImportDecision::SelfManaged(false) | ImportDecision::NoImport => Ok(Action::await_change()),
        ImportDecision::ExternallyProvisioned(deployment) => {
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
            let target = admin_kubeconfig_target(&ctx.store, deployment).await?;
            info!(cluster = %name, "Importing cluster with hive admin kubeconfig");
            ctx.applier.apply(&target, bundle).await?;
            Ok(Action::await_change())
        }
        ImportDecision::AutoImportCandidate(secret) => {
            import_with_auto_import_secret(ctx, &name, secret, bundle).await
        }
    }
}

async fn admin_kubeconfig_target<S>(store: &S, deployment: &ClusterDeployment) -> Result<ImportTarget>
where
    S: ObjectStore,
{
    let namespace = deployment.namespace().unwrap_or_default();
    let missing = || ImportError::MissingCredentials {
        source_kind: "ClusterDeployment".to_string(),
        namespace: namespace.clone(),
        name: deployment.name_any(),
    };

    let secret_name = deployment
        .spec
        .cluster_metadata
        .as_ref()
        .map(|m| m.admin_kubeconfig_secret_ref.name.clone())
        .filter(|n| !n.is_empty())
        .ok_or_else(missing)?;

    let secret: Secret = store
        .get(&ObjectKey::namespaced(&namespace, &secret_name))
        .await?
        .ok_or_else(missing)?;

    secret_value(&secret, KUBECONFIG_KEY)
        .map(ImportTarget::Kubeconfig)
        .ok_or_else(|| missing().into())
}

async fn import_with_auto_import_secret<S, A>(
    ctx: &Context<S, A>,
    cluster_name: &str,
    secret: &Secret,
    bundle: &ImportBundle,
) -> Result<Action>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    let key = ObjectKey::of(secret);
    let budget = retry_budget(secret)?;

    let attempt = match auto_import_target(secret) {
        Ok(target) => {
            info!(cluster = %cluster_name, "Importing cluster with auto-import secret");
            ctx.applier.apply(&target, bundle).await
        }
        Err(e) => Err(e.into()),
    };

    let Err(import_error) = attempt else {
        return match ctx.store.delete::<Secret>(&key).await {
            Ok(_) => {
                info!(cluster = %cluster_name, "Import succeeded, removed auto-import secret");
                Ok(Action::await_change())
            }
            Err(e) => {
                warn!(
                    cluster = %cluster_name,
                    error = %e,
                    "Import succeeded but removing the auto-import secret failed, requeueing in {}s",
                    ERROR_REQUEUE_DURATION_SECS
                );
                Ok(Action::requeue(Duration::from_secs(
                    ERROR_REQUEUE_DURATION_SECS,
                )))
            }
        };
    };

    let remaining = budget.saturating_sub(1);
    if remaining == 0 {
        warn!(
            cluster = %cluster_name,
            error = %import_error,
            "Auto-import retries exhausted, removing auto-import secret"
        );
        ctx.store.delete::<Secret>(&key).await?;
        return Err(import_error.context("auto-import retries exhausted"));
    }

    warn!(
        cluster = %cluster_name,
        error = %import_error,
        remaining,
        "Auto-import failed, will retry"
    );
    let patch = json!({
        "data": { AUTO_IMPORT_RETRY_KEY: BASE64.encode(remaining.to_string()) }
    });
    ctx.store
        .merge_patch::<Secret>(&key, &patch)
        .await
        .context("failed to decrement auto-import retry counter")?;
    Err(import_error)
}

fn auto_import_target(secret: &Secret) -> Result<ImportTarget, ImportError> {
    if let Some(kubeconfig) = secret_value(secret, KUBECONFIG_KEY) {
        return Ok(ImportTarget::Kubeconfig(kubeconfig));
    }
    match (secret_value(secret, SERVER_KEY), secret_value(secret, TOKEN_KEY)) {
        (Some(server), Some(token)) => Ok(ImportTarget::Token { server, token }),
        _ => Err(ImportError::MissingCredentials {
            source_kind: "Secret".to_string(),
            namespace: secret.namespace().unwrap_or_default(),
            name: secret.name_any(),
        }),
    }
}

/// Remaining import attempts recorded in the auto-import secret.
///
/// # Errors
///
/// Returns [`ImportError::InvalidRetryCount`] if the counter is not a number.
pub fn retry_budget(secret: &Secret) -> Result<u32, ImportError> {
    match secret_value(secret, AUTO_IMPORT_RETRY_KEY) {
        None => Ok(DEFAULT_AUTO_IMPORT_RETRY),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ImportError::InvalidRetryCount {
                namespace: secret.namespace().unwrap_or_default(),
                value: raw,
            }),
    }
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()?
        .get(key)
        .and_then(|v| String::from_utf8(v.0.clone()).ok())
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "direct_tests.rs"]
mod direct_tests;
