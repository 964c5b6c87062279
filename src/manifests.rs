// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource builders for cluster provisioning and the import bundle.
//!
//! Everything here is a pure function of a [`RenderConfig`], the hub settings and,
//! for the bundle, the bootstrap token. Output is deterministic so that the
//! reconcilers can upsert it on every pass without causing writes.
//!
//! Hub-side resources (in the cluster namespace or cluster-scoped):
//! - the bootstrap `ServiceAccount` and its token `Secret`
//! - a `ClusterRole` and `ClusterRoleBinding` granting bootstrap permissions
//!
//! Agent-side resources, shipped in the [`ImportBundle`]:
//! - `crds.yaml`: the `Klusterlet` CRD
//! - `import.yaml`: agent namespace, service account, cluster role binding,
//!   bootstrap hub kubeconfig secret and the `Klusterlet` instance

use crate::constants::{
    AGENT_BOOTSTRAP_SECRET, AGENT_NAMESPACE, AGENT_SERVICE_ACCOUNT, BOOTSTRAP_CLUSTER_ROLE_PREFIX,
    BOOTSTRAP_SERVICE_ACCOUNT_SUFFIX, BOOTSTRAP_TOKEN_SECRET_SUFFIX, IMPORT_SECRET_CRDS_KEY,
    IMPORT_SECRET_IMPORT_KEY, IMPORT_SECRET_SUFFIX, KLUSTERLET_NAME, KUBECONFIG_KEY,
    MANIFEST_WORK_SUFFIX, TOKEN_KEY,
};
use crate::crd::{Klusterlet, KlusterletSpec, ManifestWork, ManifestWorkSpec, ManifestsTemplate};
use crate::import_errors::ImportError;
use crate::labels::{
    K8S_MANAGED_BY, K8S_PART_OF, MANAGED_BY_IMPORT_CONTROLLER, PART_OF_OCM,
    SERVICE_ACCOUNT_NAME_ANNOTATION,
};
use anyhow::Result;
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::CustomResourceExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Name of the cluster role granted to the agent operator on the managed cluster
const AGENT_CLUSTER_ROLE: &str = "cluster-admin";

/// Per-cluster values every rendered resource is derived from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    pub cluster_name: String,
    pub cluster_namespace: String,
    pub bootstrap_service_account_name: String,
}

impl RenderConfig {
    /// The cluster namespace always shares the cluster's name.
    #[must_use]
    pub fn for_cluster(cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            cluster_namespace: cluster_name.to_string(),
            bootstrap_service_account_name: format!(
                "{cluster_name}{BOOTSTRAP_SERVICE_ACCOUNT_SUFFIX}"
            ),
        }
    }

    #[must_use]
    pub fn bootstrap_token_secret_name(&self) -> String {
        format!(
            "{}{BOOTSTRAP_TOKEN_SECRET_SUFFIX}",
            self.bootstrap_service_account_name
        )
    }

    #[must_use]
    pub fn bootstrap_cluster_role_name(&self) -> String {
        format!("{BOOTSTRAP_CLUSTER_ROLE_PREFIX}{}", self.cluster_name)
    }

    #[must_use]
    pub fn import_secret_name(&self) -> String {
        format!("{}{IMPORT_SECRET_SUFFIX}", self.cluster_name)
    }

    #[must_use]
    pub fn manifest_work_name(&self) -> String {
        format!("{}{MANIFEST_WORK_SUFFIX}", self.cluster_name)
    }
}

/// Hub-wide settings rendered into every import bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubSettings {
    /// URL the agent uses to reach the hub API server.
    pub api_server_url: String,
    /// Base64-encoded CA bundle of the hub API server, if not publicly trusted.
    pub ca_bundle: Option<String>,
    /// Image of the registration agent.
    pub registration_image: String,
    /// Image of the work agent.
    pub work_image: String,
}

/// Builds the standard labels carried by every resource this controller renders.
#[must_use]
pub fn build_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_IMPORT_CONTROLLER.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_OCM.into());
    labels
}

fn namespaced_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(build_labels()),
        ..Default::default()
    }
}

fn cluster_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(build_labels()),
        ..Default::default()
    }
}

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |items: &[&str]| items.iter().map(ToString::to_string).collect::<Vec<_>>();
    PolicyRule {
        api_groups: Some(owned(api_groups)),
        resources: Some(owned(resources)),
        verbs: owned(verbs),
        ..Default::default()
    }
}

// ============================================================================
// Hub-side provisioning resources
// ============================================================================

/// The identity the agent uses to bootstrap its registration with the hub.
#[must_use]
pub fn bootstrap_service_account(cfg: &RenderConfig) -> ServiceAccount {
    ServiceAccount {
        metadata: namespaced_meta(&cfg.cluster_namespace, &cfg.bootstrap_service_account_name),
        ..Default::default()
    }
}

/// Long-lived token secret for the bootstrap service account.
///
/// The token controller fills in `data.token`; it is never rendered here.
#[must_use]
pub fn bootstrap_token_secret(cfg: &RenderConfig) -> Secret {
    let mut metadata = namespaced_meta(&cfg.cluster_namespace, &cfg.bootstrap_token_secret_name());
    metadata.annotations = Some(BTreeMap::from([(
        SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
        cfg.bootstrap_service_account_name.clone(),
    )]));
    Secret {
        metadata,
        type_: Some("kubernetes.io/service-account-token".to_string()),
        ..Default::default()
    }
}

/// Permissions needed by an agent to request its hub client certificate.
#[must_use]
pub fn bootstrap_cluster_role(cfg: &RenderConfig) -> ClusterRole {
    ClusterRole {
        metadata: cluster_meta(&cfg.bootstrap_cluster_role_name()),
        rules: Some(vec![
            rule(
                &["certificates.k8s.io"],
                &["certificatesigningrequests"],
                &["create", "get", "list", "watch"],
            ),
            rule(
                &["cluster.open-cluster-management.io"],
                &["managedclusters"],
                &["get", "create"],
            ),
        ]),
        ..Default::default()
    }
}

/// Binds the bootstrap cluster role to the bootstrap service account.
#[must_use]
pub fn bootstrap_cluster_role_binding(cfg: &RenderConfig) -> ClusterRoleBinding {
    let role_name = cfg.bootstrap_cluster_role_name();
    ClusterRoleBinding {
        metadata: cluster_meta(&role_name),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: role_name,
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: cfg.bootstrap_service_account_name.clone(),
            namespace: Some(cfg.cluster_namespace.clone()),
            ..Default::default()
        }]),
    }
}

/// Extract the issued bootstrap token from its secret.
///
/// # Errors
///
/// Returns [`ImportError::BootstrapTokenPending`] if the secret is missing or
/// has not been populated by the token controller yet.
pub fn bootstrap_token(cfg: &RenderConfig, secret: Option<&Secret>) -> Result<String, ImportError> {
    secret
        .and_then(|s| s.data.as_ref())
        .and_then(|data| data.get(TOKEN_KEY))
        .and_then(|token| String::from_utf8(token.0.clone()).ok())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ImportError::BootstrapTokenPending {
            namespace: cfg.cluster_namespace.clone(),
            secret: cfg.bootstrap_token_secret_name(),
        })
}

// ============================================================================
// Kubeconfig rendering
// ============================================================================

/// Render a single-context kubeconfig authenticating with a bearer token.
///
/// Without a CA bundle the server certificate is not verified.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn token_kubeconfig(server: &str, ca_bundle: Option<&str>, token: &str) -> Result<String> {
    let cluster = match ca_bundle {
        Some(ca) => json!({ "server": server, "certificate-authority-data": ca }),
        None => json!({ "server": server, "insecure-skip-tls-verify": true }),
    };
    let kubeconfig = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": "default-cluster", "cluster": cluster }],
        "users": [{ "name": "default-auth", "user": { "token": token } }],
        "contexts": [{
            "name": "default-context",
            "context": { "cluster": "default-cluster", "user": "default-auth" }
        }],
        "current-context": "default-context",
    });
    Ok(serde_yaml::to_string(&kubeconfig)?)
}

// ============================================================================
// Import bundle
// ============================================================================

/// Manifests an agent needs to join the hub.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportBundle {
    /// CRDs, applied before anything else.
    pub crds: Vec<Value>,
    /// Everything else, in apply order.
    pub manifests: Vec<Value>,
}

impl ImportBundle {
    /// All documents in apply order: CRDs first.
    pub fn documents(&self) -> impl Iterator<Item = &Value> {
        self.crds.iter().chain(&self.manifests)
    }

    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn crds_yaml(&self) -> Result<String> {
        to_multi_document_yaml(&self.crds)
    }

    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn import_yaml(&self) -> Result<String> {
        to_multi_document_yaml(&self.manifests)
    }
}

fn to_multi_document_yaml(documents: &[Value]) -> Result<String> {
    let rendered = documents
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join("---\n"))
}

fn to_document<T: Serialize>(resource: &T) -> Result<Value> {
    Ok(serde_json::to_value(resource)?)
}

/// Render the import bundle for a cluster.
///
/// # Errors
///
/// Returns an error if a resource fails to serialize.
pub fn import_bundle(cfg: &RenderConfig, hub: &HubSettings, token: &str) -> Result<ImportBundle> {
    let kubeconfig = token_kubeconfig(&hub.api_server_url, hub.ca_bundle.as_deref(), token)?;

    let namespace = Namespace {
        metadata: cluster_meta(AGENT_NAMESPACE),
        ..Default::default()
    };
    let service_account = ServiceAccount {
        metadata: namespaced_meta(AGENT_NAMESPACE, AGENT_SERVICE_ACCOUNT),
        ..Default::default()
    };
    let binding = ClusterRoleBinding {
        metadata: cluster_meta(&format!("{KLUSTERLET_NAME}-{AGENT_CLUSTER_ROLE}")),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: AGENT_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: AGENT_SERVICE_ACCOUNT.to_string(),
            namespace: Some(AGENT_NAMESPACE.to_string()),
            ..Default::default()
        }]),
    };
    let bootstrap_secret = Secret {
        metadata: namespaced_meta(AGENT_NAMESPACE, AGENT_BOOTSTRAP_SECRET),
        data: Some(BTreeMap::from([(
            KUBECONFIG_KEY.to_string(),
            ByteString(kubeconfig.into_bytes()),
        )])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };
    let mut klusterlet = Klusterlet::new(
        KLUSTERLET_NAME,
        KlusterletSpec {
            cluster_name: cfg.cluster_name.clone(),
            namespace: AGENT_NAMESPACE.to_string(),
            registration_image_pull_spec: hub.registration_image.clone(),
            work_image_pull_spec: hub.work_image.clone(),
        },
    );
    klusterlet.metadata.labels = Some(build_labels());

    Ok(ImportBundle {
        crds: vec![to_document(&Klusterlet::crd())?],
        manifests: vec![
            to_document(&namespace)?,
            to_document(&service_account)?,
            to_document(&binding)?,
            to_document(&bootstrap_secret)?,
            to_document(&klusterlet)?,
        ],
    })
}

/// The `<cluster>-import` secret holding the rendered bundle.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn import_secret(cfg: &RenderConfig, bundle: &ImportBundle) -> Result<Secret> {
    Ok(Secret {
        metadata: namespaced_meta(&cfg.cluster_namespace, &cfg.import_secret_name()),
        data: Some(BTreeMap::from([
            (
                IMPORT_SECRET_CRDS_KEY.to_string(),
                ByteString(bundle.crds_yaml()?.into_bytes()),
            ),
            (
                IMPORT_SECRET_IMPORT_KEY.to_string(),
                ByteString(bundle.import_yaml()?.into_bytes()),
            ),
        ])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// The work item delivering the bundle to a reachable cluster.
#[must_use]
pub fn manifest_work(cfg: &RenderConfig, bundle: &ImportBundle) -> ManifestWork {
    let mut work = ManifestWork::new(
        &cfg.manifest_work_name(),
        ManifestWorkSpec {
            workload: ManifestsTemplate {
                manifests: bundle.documents().cloned().collect(),
            },
        },
    );
    work.metadata.namespace = Some(cfg.cluster_namespace.clone());
    work.metadata.labels = Some(build_labels());
    work
}

#[cfg(test)]
#[path = "manifests_tests.rs"]
mod manifests_tests;
