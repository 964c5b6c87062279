// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory test doubles for the object store and the remote applier.

use crate::constants::{STATUS_FALSE, STATUS_TRUE, STATUS_UNKNOWN};
use crate::crd::{Condition, ManagedCluster, ManagedClusterSpec, ManagedClusterStatus};
use crate::import::remote::{ImportTarget, RemoteApplier};
use crate::manifests::ImportBundle;
use crate::store::{ObjectKey, ObjectStore, ReadPath, StoredKind};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Verb of a recorded store call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    Create,
    Replace,
    Patch,
    PatchStatus,
    Delete,
}

impl Verb {
    fn is_mutation(self) -> bool {
        !matches!(self, Verb::Get)
    }
}

/// A call observed by [`FakeStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub kind: String,
    pub key: ObjectKey,
    pub read_path: Option<ReadPath>,
}

/// Object store kept in memory, recording every call it receives.
///
/// Objects are stored as JSON keyed by kind and [`ObjectKey`]. Namespaces and
/// objects carrying finalizers are only marked for deletion on `delete`, the
/// way the API server does.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<(String, ObjectKey), Value>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<(Verb, String)>>,
    next_version: Mutex<u64>,
}

fn kind_of<K: StoredKind>() -> String {
    K::kind(&()).to_string()
}

impl FakeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording a call.
    pub fn insert<K: StoredKind>(&self, resource: K) {
        let key = ObjectKey::of(&resource);
        let mut value = serde_json::to_value(&resource).expect("serializable");
        self.stamp_version(&mut value);
        self.objects
            .lock()
            .unwrap()
            .insert((kind_of::<K>(), key), value);
    }

    /// Seed an object from raw JSON, keeping fields the typed model lacks.
    pub fn insert_raw<K: StoredKind>(&self, mut value: Value) {
        let key = ObjectKey {
            namespace: value["metadata"]["namespace"].as_str().map(ToString::to_string),
            name: value["metadata"]["name"].as_str().unwrap_or_default().to_string(),
        };
        self.stamp_version(&mut value);
        self.objects
            .lock()
            .unwrap()
            .insert((kind_of::<K>(), key), value);
    }

    /// The stored JSON of an object, including fields the typed model lacks.
    pub fn peek_raw<K: StoredKind>(&self, key: &ObjectKey) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind_of::<K>(), key.clone()))
            .cloned()
    }

    /// Read an object without recording a call.
    pub fn peek<K: StoredKind>(&self, key: &ObjectKey) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind_of::<K>(), key.clone()))
            .map(|v| serde_json::from_value(v.clone()).expect("deserializable"))
    }

    pub fn contains<K: StoredKind>(&self, key: &ObjectKey) -> bool {
        self.peek::<K>(key).is_some()
    }

    /// Make every subsequent call with this verb on this kind fail.
    pub fn fail_on<K: StoredKind>(&self, verb: Verb) {
        self.failures.lock().unwrap().push((verb, kind_of::<K>()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.verb.is_mutation())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn stamp_version(&self, value: &mut Value) {
        let mut next = self.next_version.lock().unwrap();
        *next += 1;
        value["metadata"]["resourceVersion"] = Value::String(next.to_string());
    }

    fn record<K: StoredKind>(&self, verb: Verb, key: &ObjectKey) -> Result<()> {
        let read_path = (verb == Verb::Get).then_some(K::READ_PATH);
        self.calls.lock().unwrap().push(Call {
            verb,
            kind: kind_of::<K>(),
            key: key.clone(),
            read_path,
        });
        if self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|(v, k)| *v == verb && *k == kind_of::<K>())
        {
            bail!("injected {:?} failure for {} {}", verb, kind_of::<K>(), key);
        }
        Ok(())
    }

    fn patch_object<K: StoredKind>(&self, key: &ObjectKey, patch: &Value) -> Result<K> {
        let mut objects = self.objects.lock().unwrap();
        let map_key = (kind_of::<K>(), key.clone());
        let value = objects
            .get_mut(&map_key)
            .ok_or_else(|| anyhow!("{} {} not found", kind_of::<K>(), key))?;
        let expected = &patch["metadata"]["resourceVersion"];
        if !expected.is_null() && *expected != value["metadata"]["resourceVersion"] {
            bail!("Conflict: {} {} has been modified", kind_of::<K>(), key);
        }
        merge_json(value, patch);
        self.stamp_version(value);
        let patched = value.clone();
        if !patched["metadata"]["deletionTimestamp"].is_null() && !has_finalizers(&patched) {
            objects.remove(&map_key);
        }
        Ok(serde_json::from_value(patched)?)
    }
}

/// RFC 7386 JSON merge patch.
fn merge_json(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if !target.is_object() {
            *target = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(target_map) = target {
            for (k, v) in patch_map {
                if v.is_null() {
                    target_map.remove(k);
                } else {
                    merge_json(target_map.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
    } else {
        *target = patch.clone();
    }
}

fn has_finalizers(value: &Value) -> bool {
    value["metadata"]["finalizers"]
        .as_array()
        .is_some_and(|f| !f.is_empty())
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get<K: StoredKind>(&self, key: &ObjectKey) -> Result<Option<K>> {
        self.record::<K>(Verb::Get, key)?;
        Ok(self.peek(key))
    }

    async fn create<K: StoredKind>(&self, resource: &K) -> Result<K> {
        let key = ObjectKey::of(resource);
        self.record::<K>(Verb::Create, &key)?;
        if self.contains::<K>(&key) {
            bail!("{} {} AlreadyExists", kind_of::<K>(), key);
        }
        let mut value = serde_json::to_value(resource)?;
        self.stamp_version(&mut value);
        self.objects
            .lock()
            .unwrap()
            .insert((kind_of::<K>(), key), value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: StoredKind>(&self, resource: &K) -> Result<K> {
        let key = ObjectKey::of(resource);
        self.record::<K>(Verb::Replace, &key)?;
        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get(&(kind_of::<K>(), key.clone()))
            .ok_or_else(|| anyhow!("{} {} not found", kind_of::<K>(), key))?;
        let stored_version = stored["metadata"]["resourceVersion"].clone();
        if let Some(version) = &resource.meta().resource_version {
            if stored_version != Value::String(version.clone()) {
                bail!("Conflict: {} {} has been modified", kind_of::<K>(), key);
            }
        }
        let mut value = serde_json::to_value(resource)?;
        self.stamp_version(&mut value);
        if !value["metadata"]["deletionTimestamp"].is_null() && !has_finalizers(&value) {
            objects.remove(&(kind_of::<K>(), key));
        } else {
            objects.insert((kind_of::<K>(), key), value.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn merge_patch<K: StoredKind>(&self, key: &ObjectKey, patch: &Value) -> Result<K> {
        self.record::<K>(Verb::Patch, key)?;
        self.patch_object(key, patch)
    }

    async fn merge_patch_status<K: StoredKind>(
        &self,
        key: &ObjectKey,
        patch: &Value,
    ) -> Result<K> {
        self.record::<K>(Verb::PatchStatus, key)?;
        let status_only = serde_json::json!({ "status": patch["status"].clone() });
        self.patch_object(key, &status_only)
    }

    async fn delete<K: StoredKind>(&self, key: &ObjectKey) -> Result<bool> {
        self.record::<K>(Verb::Delete, key)?;
        let mut objects = self.objects.lock().unwrap();
        let map_key = (kind_of::<K>(), key.clone());
        let Some(value) = objects.get_mut(&map_key) else {
            return Ok(false);
        };
        if kind_of::<K>() == "Namespace" || has_finalizers(value) {
            value["metadata"]["deletionTimestamp"] = Value::String("2025-01-01T00:00:00Z".into());
        } else {
            objects.remove(&map_key);
        }
        Ok(true)
    }
}

/// [`RemoteApplier`] that records every target it was asked to import into.
#[derive(Default)]
pub struct RecordingApplier {
    targets: Mutex<Vec<ImportTarget>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingApplier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        let applier = Self::default();
        *applier.fail_with.lock().unwrap() = Some(message.to_string());
        applier
    }

    pub fn targets(&self) -> Vec<ImportTarget> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteApplier for RecordingApplier {
    async fn apply(&self, target: &ImportTarget, _bundle: &ImportBundle) -> Result<()> {
        self.targets.lock().unwrap().push(target.clone());
        match self.fail_with.lock().unwrap().as_ref() {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn managed_cluster(name: &str) -> ManagedCluster {
    let mut cluster = ManagedCluster::new(
        name,
        ManagedClusterSpec {
            hub_accepts_client: true,
            ..Default::default()
        },
    );
    cluster.status = Some(ManagedClusterStatus::default());
    cluster
}

pub fn with_labels(mut cluster: ManagedCluster, labels: &[(&str, &str)]) -> ManagedCluster {
    let map = cluster.metadata.labels.get_or_insert_with(BTreeMap::new);
    for (k, v) in labels {
        map.insert((*k).to_string(), (*v).to_string());
    }
    cluster
}

/// Set the availability condition; `None` leaves it unreported.
pub fn with_available(mut cluster: ManagedCluster, available: Option<bool>) -> ManagedCluster {
    let status = cluster.status.get_or_insert_with(Default::default);
    status
        .conditions
        .retain(|c| c.r#type != crate::constants::CONDITION_AVAILABLE);
    if let Some(available) = available {
        status.conditions.push(Condition {
            r#type: crate::constants::CONDITION_AVAILABLE.to_string(),
            status: if available { STATUS_TRUE } else { STATUS_FALSE }.to_string(),
            reason: Some("ManagedClusterAvailable".to_string()),
            message: None,
            last_transition_time: None,
        });
    }
    cluster
}

pub fn with_unknown_availability(mut cluster: ManagedCluster) -> ManagedCluster {
    cluster.status.get_or_insert_with(Default::default).conditions = vec![Condition {
        r#type: crate::constants::CONDITION_AVAILABLE.to_string(),
        status: STATUS_UNKNOWN.to_string(),
        ..Default::default()
    }];
    cluster
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// A cluster namespace with an issued bootstrap token, ready for provisioning.
pub fn seeded_store(cluster: ManagedCluster) -> FakeStore {
    let store = FakeStore::new();
    let name = cluster.metadata.name.clone().unwrap_or_default();
    let cfg = crate::manifests::RenderConfig::for_cluster(&name);
    let mut token_secret = crate::manifests::bootstrap_token_secret(&cfg);
    token_secret.data = Some(BTreeMap::from([(
        "token".to_string(),
        ByteString(b"bootstrap-token-value".to_vec()),
    )]));
    store.insert(namespace(&name));
    store.insert(token_secret);
    store.insert(cluster);
    store
}

pub fn hub_settings() -> crate::manifests::HubSettings {
    crate::manifests::HubSettings {
        api_server_url: "https://hub.example.com:6443".to_string(),
        ca_bundle: None,
        registration_image: "quay.io/open-cluster-management/registration:latest".to_string(),
        work_image: "quay.io/open-cluster-management/work:latest".to_string(),
    }
}

pub fn test_context(
    store: FakeStore,
    applier: RecordingApplier,
) -> crate::context::Context<FakeStore, RecordingApplier> {
    crate::context::Context::new(
        store,
        applier,
        hub_settings(),
        crate::metrics::Metrics::new().expect("metrics"),
    )
}
