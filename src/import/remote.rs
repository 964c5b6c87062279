// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Applying the import bundle to a cluster's API server.

use crate::constants::{FIELD_MANAGER, REMOTE_CONNECT_TIMEOUT_SECS, REMOTE_READ_TIMEOUT_SECS};
use crate::manifests::{token_kubeconfig, ImportBundle};
use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use kube::api::{DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::Discovery;
use kube::{Api, Client, Config};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// API server the bundle is applied to.
#[derive(Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// The hub's own API server.
    Hub,
    /// A cluster reachable with the given kubeconfig.
    Kubeconfig(String),
    /// A cluster reachable with a bearer token.
    Token { server: String, token: String },
}

// Credentials stay out of logs.
impl fmt::Debug for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hub => write!(f, "Hub"),
            Self::Kubeconfig(_) => write!(f, "Kubeconfig(..)"),
            Self::Token { server, .. } => write!(f, "Token {{ server: {server:?}, .. }}"),
        }
    }
}

/// Applies an [`ImportBundle`] to an [`ImportTarget`].
#[async_trait]
pub trait RemoteApplier: Send + Sync {
    /// Apply every document of the bundle, CRDs first.
    async fn apply(&self, target: &ImportTarget, bundle: &ImportBundle) -> Result<()>;
}

/// [`RemoteApplier`] using server-side apply through dynamic objects.
#[derive(Clone)]
pub struct KubeRemoteApplier {
    hub: Client,
}

impl KubeRemoteApplier {
    #[must_use]
    pub fn new(hub: Client) -> Self {
        Self { hub }
    }

    async fn client_for(&self, target: &ImportTarget) -> Result<Client> {
        let kubeconfig = match target {
            ImportTarget::Hub => return Ok(self.hub.clone()),
            ImportTarget::Kubeconfig(kubeconfig) => kubeconfig.clone(),
            ImportTarget::Token { server, token } => token_kubeconfig(server, None, token)?,
        };

        let kubeconfig: Kubeconfig =
            serde_yaml::from_str(&kubeconfig).context("invalid kubeconfig YAML")?;
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("failed to load kubeconfig")?;
        config.connect_timeout = Some(Duration::from_secs(REMOTE_CONNECT_TIMEOUT_SECS));
        config.read_timeout = Some(Duration::from_secs(REMOTE_READ_TIMEOUT_SECS));
        Ok(Client::try_from(config)?)
    }
}

#[async_trait]
impl RemoteApplier for KubeRemoteApplier {
    async fn apply(&self, target: &ImportTarget, bundle: &ImportBundle) -> Result<()> {
        let client = self.client_for(target).await?;
        let params = PatchParams::apply(FIELD_MANAGER).force();

        // CRDs must be registered before discovery can resolve the kinds they define.
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .context("failed to run API discovery")?;
        for document in &bundle.crds {
            apply_document(&client, &discovery, document, &params).await?;
        }

        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .context("failed to refresh API discovery")?;
        for document in &bundle.manifests {
            apply_document(&client, &discovery, document, &params).await?;
        }

        info!(target = ?target, documents = bundle.crds.len() + bundle.manifests.len(), "Applied import bundle");
        Ok(())
    }
}

async fn apply_document(
    client: &Client,
    discovery: &Discovery,
    document: &Value,
    params: &PatchParams,
) -> Result<()> {
    let kind = document["kind"]
        .as_str()
        .ok_or_else(|| anyhow!("manifest is missing kind"))?;
    let api_version = document["apiVersion"]
        .as_str()
        .ok_or_else(|| anyhow!("manifest is missing apiVersion"))?;
    let name = document
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("manifest is missing metadata.name"))?;
    let namespace = document.pointer("/metadata/namespace").and_then(Value::as_str);

    let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
    let gvk = GroupVersionKind::gvk(group, version, kind);
    let (resource, _) = discovery
        .resolve_gvk(&gvk)
        .ok_or_else(|| anyhow!("unknown resource type {api_version}/{kind}"))?;

    let api: Api<DynamicObject> = match namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &resource),
        None => Api::all_with(client.clone(), &resource),
    };
    api.patch(name, params, &Patch::Apply(document))
        .await
        .with_context(|| format!("failed to apply {kind} {name}"))?;

    debug!(kind = %kind, name = %name, namespace = ?namespace, "Applied manifest");
    Ok(())
}
