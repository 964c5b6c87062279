// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Import decision engine.
//!
//! When a cluster is not reachable through its agent, the hub may push the
//! import bundle to it directly. Whether and how is decided from three pieces of
//! evidence, in strict priority order:
//!
//! 1. the `local-cluster` label, whose boolean value is final
//! 2. a hive `ClusterDeployment` named after the cluster in its namespace
//! 3. an `auto-import-secret` in the cluster namespace
//!
//! The first rule that applies wins; lower rules are never looked up.

pub mod direct;
pub mod remote;

use crate::constants::{AUTO_IMPORT_SECRET_NAME, CONDITION_AVAILABLE, STATUS_TRUE};
use crate::crd::{ClusterDeployment, ManagedCluster};
use crate::import_errors::ImportError;
use crate::labels::SELF_MANAGED_LABEL;
use crate::store::{ObjectKey, ObjectStore};
use anyhow::Result;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, info};

/// Outcome of the import decision, carrying the evidence the import will use.
#[derive(Clone, Debug)]
pub enum ImportDecision {
    /// The `local-cluster` label decided; `true` imports into the hub itself.
    SelfManaged(bool),
    /// Provisioned by hive; credentials come from the deployment's admin kubeconfig.
    ExternallyProvisioned(ClusterDeployment),
    /// An auto-import secret holds credentials and a retry budget.
    AutoImportCandidate(Secret),
    /// No evidence of import intent.
    NoImport,
}

impl ImportDecision {
    #[must_use]
    pub fn should_import(&self) -> bool {
        match self {
            Self::SelfManaged(import) => *import,
            Self::ExternallyProvisioned(_) | Self::AutoImportCandidate(_) => true,
            Self::NoImport => false,
        }
    }

    /// The cluster is provisioned by hive, which has not finished installing it.
    #[must_use]
    pub fn awaiting_install(&self) -> bool {
        matches!(self, Self::ExternallyProvisioned(cd) if !cd.spec.installed)
    }
}

/// A cluster is offline unless its agent reports the available condition as `True`.
#[must_use]
pub fn is_offline(cluster: &ManagedCluster) -> bool {
    !cluster
        .status
        .as_ref()
        .and_then(|status| {
            status
                .conditions
                .iter()
                .find(|c| c.r#type == CONDITION_AVAILABLE)
        })
        .is_some_and(|c| c.status == STATUS_TRUE)
}

/// Parse a boolean label value.
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false counterparts.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Decide whether and how an offline cluster is imported.
///
/// # Errors
///
/// Returns [`ImportError::MalformedSelfManagedLabel`] for a non-boolean label and
/// propagates store failures other than not-found.
pub async fn decide_import<S>(store: &S, cluster: &ManagedCluster) -> Result<ImportDecision>
where
    S: ObjectStore + ?Sized,
{
    let name = cluster.name_any();

    if let Some(value) = cluster.labels().get(SELF_MANAGED_LABEL) {
        let import = parse_bool(value).ok_or_else(|| ImportError::MalformedSelfManagedLabel {
            cluster: name.clone(),
            value: value.clone(),
        })?;
        debug!(cluster = %name, import, "Self-managed label decides import");
        return Ok(ImportDecision::SelfManaged(import));
    }

    if let Some(deployment) = store
        .get::<ClusterDeployment>(&ObjectKey::namespaced(&name, &name))
        .await?
    {
        debug!(cluster = %name, "ClusterDeployment found, importing");
        return Ok(ImportDecision::ExternallyProvisioned(deployment));
    }

    match store
        .get::<Secret>(&ObjectKey::namespaced(&name, AUTO_IMPORT_SECRET_NAME))
        .await?
    {
        Some(secret) => {
            info!(cluster = %name, "Auto-import secret found, will retry import");
            Ok(ImportDecision::AutoImportCandidate(secret))
        }
        None => {
            info!(cluster = %name, "No auto-import secret, not importing");
            Ok(ImportDecision::NoImport)
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
