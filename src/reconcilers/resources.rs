// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic resource creation and update helpers.
//!
//! This module provides the two write strategies the provisioning pipeline uses
//! against an [`ObjectStore`]:
//!
//! - **Create if absent**: create the resource only when nothing exists under its
//!   key. An existing object is never touched.
//! - **Upsert**: create if absent; replace only when the stored object differs
//!   from the desired one. Fields the server adds (resource version, defaults,
//!   token data) do not count as a difference, so an unchanged resource costs a
//!   single read.
//!
//! # Example
//!
//! ```rust,no_run
//! use managedcluster_import::reconcilers::resources::upsert;
//! use managedcluster_import::store::KubeStore;
//! use k8s_openapi::api::rbac::v1::ClusterRole;
//! use anyhow::Result;
//!
//! async fn example(store: &KubeStore, role: ClusterRole) -> Result<()> {
//!     upsert(store, &role).await?;
//!     Ok(())
//! }
//! ```

use crate::store::{ObjectKey, ObjectStore, StoredKind};
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

/// Outcome of a write helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Create a resource only if nothing exists under its key.
///
/// # Errors
///
/// Returns an error if the lookup or the create fails.
pub async fn create_if_absent<S, K>(store: &S, resource: &K) -> Result<WriteOutcome>
where
    S: ObjectStore + ?Sized,
    K: StoredKind,
{
    let key = ObjectKey::of(resource);

    if store.get::<K>(&key).await?.is_some() {
        debug!(kind = %K::kind(&()), key = %key, "Resource exists, leaving it untouched");
        return Ok(WriteOutcome::Unchanged);
    }

    store.create(resource).await?;
    info!("Created {} {}", K::kind(&()), key);
    Ok(WriteOutcome::Created)
}

/// Create a resource, or replace it when the stored object has drifted.
///
/// The replacement carries the stored resource version so that a concurrent
/// writer makes this call fail rather than being overwritten.
///
/// # Errors
///
/// Returns an error if the lookup, create or replace fails.
pub async fn upsert<S, K>(store: &S, desired: &K) -> Result<WriteOutcome>
where
    S: ObjectStore + ?Sized,
    K: StoredKind,
{
    let key = ObjectKey::of(desired);

    debug!(kind = %K::kind(&()), key = %key, "Upserting resource");

    let Some(existing) = store.get::<K>(&key).await? else {
        store.create(desired).await?;
        info!("Created {} {}", K::kind(&()), key);
        return Ok(WriteOutcome::Created);
    };

    let desired_json = serde_json::to_value(desired)?;
    let existing_json = serde_json::to_value(&existing)?;
    if is_subset(&desired_json, &existing_json) {
        debug!(kind = %K::kind(&()), key = %key, "Resource up to date");
        return Ok(WriteOutcome::Unchanged);
    }

    let mut replacement = desired.clone();
    replacement.meta_mut().resource_version = existing.meta().resource_version.clone();
    store.replace(&replacement).await?;
    info!("Replaced {} {}", K::kind(&()), key);
    Ok(WriteOutcome::Updated)
}

/// Whether every field set in `desired` holds the same value in `existing`.
///
/// `null` in `desired` constrains nothing. Arrays must have the same length and
/// match element by element.
#[must_use]
pub fn is_subset(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Null, _) => true,
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(k, v)| {
            v.is_null() || have.get(k).is_some_and(|existing| is_subset(v, existing))
        }),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        (want, have) => want == have,
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
