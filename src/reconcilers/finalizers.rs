// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for resources in the object store.
//!
//! Additions are done in memory so the caller can batch them with other
//! metadata changes into one patch. Removals write immediately. Every write is a
//! metadata-only merge patch carrying the observed resource version, so fields
//! the controller does not model are never touched.
//!
//! # Example
//!
//! ```rust,no_run
//! use managedcluster_import::reconcilers::finalizers::remove_finalizers;
//! use managedcluster_import::crd::ClusterDeployment;
//! use managedcluster_import::labels::FINALIZER_MANAGED_CLUSTER;
//! use managedcluster_import::store::KubeStore;
//! use anyhow::Result;
//!
//! async fn release(store: &KubeStore, cd: &ClusterDeployment) -> Result<()> {
//!     remove_finalizers(store, cd, &[FINALIZER_MANAGED_CLUSTER]).await?;
//!     Ok(())
//! }
//! ```

use crate::store::{ObjectKey, ObjectStore, StoredKind};
use anyhow::Result;
use kube::Resource;
use serde_json::{json, Value};
use tracing::info;

/// Whether `finalizer` is present on the resource.
#[must_use]
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Add a finalizer to the in-memory resource. Returns whether it was missing.
pub fn add_finalizer<T: Resource>(resource: &mut T, finalizer: &str) -> bool {
    if has_finalizer(resource, finalizer) {
        return false;
    }
    resource
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Finalizers on the resource that are not in `owned`.
#[must_use]
pub fn foreign_finalizers<T: Resource>(resource: &T, owned: &[&str]) -> Vec<String> {
    resource
        .meta()
        .finalizers
        .iter()
        .flatten()
        .filter(|f| !owned.contains(&f.as_str()))
        .cloned()
        .collect()
}

/// Metadata merge patch setting the finalizer list of `resource` to `finalizers`.
///
/// The observed resource version is included so a concurrent writer makes the
/// patch fail with a conflict instead of being overwritten.
#[must_use]
pub fn finalizers_patch<T: Resource>(resource: &T, finalizers: &[String]) -> Value {
    let mut patch = json!({ "metadata": { "finalizers": finalizers } });
    if let Some(version) = &resource.meta().resource_version {
        patch["metadata"]["resourceVersion"] = Value::String(version.clone());
    }
    patch
}

/// Remove the given finalizers from a stored resource in a single patch.
///
/// Returns `false` without writing when none of them is present.
///
/// # Errors
///
/// Returns an error if the patch fails, including on a resource version conflict.
pub async fn remove_finalizers<S, T>(store: &S, resource: &T, finalizers: &[&str]) -> Result<bool>
where
    S: ObjectStore + ?Sized,
    T: StoredKind,
{
    if !finalizers.iter().any(|f| has_finalizer(resource, f)) {
        return Ok(false);
    }

    let remaining: Vec<String> = foreign_finalizers(resource, finalizers);

    let key = ObjectKey::of(resource);
    info!(
        "Removing finalizers {:?} from {} {}",
        finalizers,
        T::kind(&()),
        key
    );
    store
        .merge_patch::<T>(&key, &finalizers_patch(resource, &remaining))
        .await?;

    Ok(true)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
