// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object-access abstraction used by every reconciler.
//!
//! Reconcilers never build `Api<K>` handles themselves. They go through an
//! [`ObjectStore`], which gives them three things:
//!
//! - **Benign absence** - `get` returns `Ok(None)` for not-found, so absence is a
//!   value to branch on and every remaining error is a real failure.
//! - **Per-kind read consistency** - each [`StoredKind`] declares a [`ReadPath`].
//!   Credential material (`Secret`) is always read from the authoritative store;
//!   everything else may be served from the API server watch cache.
//! - **Testability** - the reconcilers are generic over the store, so unit tests
//!   run the full pipeline against an in-memory implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use managedcluster_import::store::{KubeStore, ObjectKey, ObjectStore};
//! use k8s_openapi::api::core::v1::Namespace;
//! use kube::Client;
//!
//! # async fn example(client: Client) -> anyhow::Result<()> {
//! let store = KubeStore::new(client);
//! let ns: Option<Namespace> = store.get(&ObjectKey::cluster_scoped("prod-east")).await?;
//! # Ok(())
//! # }
//! ```

use crate::crd::{ClusterDeployment, ManagedCluster, ManifestWork, SyncSet};
use crate::constants::FIELD_MANAGER;
use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{DeleteParams, GetParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Where reads of a given kind are served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadPath {
    /// Any recent version is acceptable (API server watch cache).
    Cached,
    /// Must observe the latest committed version (quorum read).
    Authoritative,
}

/// A resource kind the controller reads or writes through an [`ObjectStore`].
pub trait StoredKind:
    Resource<DynamicType = ()> + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Consistency required when reading this kind.
    const READ_PATH: ReadPath = ReadPath::Cached;

    /// Build an API handle for this kind, namespaced when the kind is.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! cluster_scoped_kind {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl StoredKind for $kind {
                fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client)
                }
            }
        )+
    };
}

macro_rules! namespaced_kind {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl StoredKind for $kind {
                fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                    Api::namespaced(client, namespace.unwrap_or_default())
                }
            }
        )+
    };
}

cluster_scoped_kind!(ManagedCluster, Namespace, ClusterRole, ClusterRoleBinding);
namespaced_kind!(ServiceAccount, ManifestWork, ClusterDeployment, SyncSet);

impl StoredKind for Secret {
    const READ_PATH: ReadPath = ReadPath::Authoritative;

    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        Api::namespaced(client, namespace.unwrap_or_default())
    }
}

/// Name and optional namespace of a stored object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a cluster-scoped object.
    #[must_use]
    pub fn cluster_scoped(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
        }
    }

    /// Key of a namespaced object.
    #[must_use]
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Key addressing an existing object.
    #[must_use]
    pub fn of<K: Resource>(resource: &K) -> Self {
        Self {
            namespace: resource.meta().namespace.clone(),
            name: resource.meta().name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Read/write access to the object store backing the hub.
///
/// Implementations must map "not found" to `Ok(None)` on `get` and to
/// `Ok(false)` on `delete`; every other failure is returned unchanged.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, honoring the kind's [`ReadPath`].
    async fn get<K: StoredKind>(&self, key: &ObjectKey) -> Result<Option<K>>;

    /// Create an object. Fails if it already exists.
    async fn create<K: StoredKind>(&self, resource: &K) -> Result<K>;

    /// Replace an object. The resource version carried by `resource` guards
    /// against lost updates.
    async fn replace<K: StoredKind>(&self, resource: &K) -> Result<K>;

    /// Apply a JSON merge patch to an object.
    async fn merge_patch<K: StoredKind>(&self, key: &ObjectKey, patch: &serde_json::Value)
        -> Result<K>;

    /// Apply a JSON merge patch to the status subresource of an object.
    async fn merge_patch_status<K: StoredKind>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K>;

    /// Delete an object. Returns `false` when it was already gone.
    async fn delete<K: StoredKind>(&self, key: &ObjectKey) -> Result<bool>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoredKind>(&self, namespace: Option<&str>) -> Api<K> {
        K::api(self.client.clone(), namespace)
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoredKind>(&self, key: &ObjectKey) -> Result<Option<K>> {
        let api = self.api::<K>(key.namespace.as_deref());

        debug!(
            kind = %K::kind(&()),
            key = %key,
            read_path = ?K::READ_PATH,
            "Reading object"
        );

        let result = match K::READ_PATH {
            ReadPath::Cached => api.get_with(&key.name, &GetParams::any()).await,
            ReadPath::Authoritative => api.get(&key.name).await,
        };

        match result {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create<K: StoredKind>(&self, resource: &K) -> Result<K> {
        let api = self.api::<K>(resource.meta().namespace.as_deref());
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.create(&params, resource).await?)
    }

    async fn replace<K: StoredKind>(&self, resource: &K) -> Result<K> {
        let api = self.api::<K>(resource.meta().namespace.as_deref());
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.replace(&resource.name_any(), &params, resource).await?)
    }

    async fn merge_patch<K: StoredKind>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K> {
        let api = self.api::<K>(key.namespace.as_deref());
        Ok(api
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn merge_patch_status<K: StoredKind>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K> {
        let api = self.api::<K>(key.namespace.as_deref());
        Ok(api
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn delete<K: StoredKind>(&self, key: &ObjectKey) -> Result<bool> {
        let api = self.api::<K>(key.namespace.as_deref());
        match api.delete(&key.name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
