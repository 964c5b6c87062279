// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch event filtering for secondary resources.
//!
//! The controller re-reconciles a `ManagedCluster` when its `ManifestWork` is
//! deleted or has its spec changed by someone else. Creations (which the
//! controller caused itself), initial listings, status updates and metadata-only
//! updates are dropped before they reach the controller queue. Changes and
//! deletions missed during a watch gap are recovered from the re-list.

use crate::crd::{ManagedCluster, ManifestWork};
use crate::store::ObjectKey;
use futures::{stream, Stream, StreamExt};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Admits watch events whose projected state changed since it was last seen.
///
/// The projection selects the part of an object that matters, typically its
/// spec. The filter remembers the last projection per object:
///
/// - first listing: remembered, not admitted
/// - first sighting outside a listing (a creation): remembered, not admitted
/// - update with an unchanged projection: not admitted
/// - update with a changed projection: remembered and admitted
/// - deletion: forgotten and admitted
///
/// A re-list after a watch gap is compared against what was remembered: changed
/// objects are admitted as updates, and objects missing from the new listing are
/// forgotten and admitted as deletions once the listing completes.
pub struct SpecChangeFilter<K, F> {
    project: F,
    seen: HashMap<ObjectKey, (Value, K)>,
    listed: Option<HashSet<ObjectKey>>,
}

impl<K, F> SpecChangeFilter<K, F>
where
    K: Resource + Clone,
    F: Fn(&K) -> Value,
{
    pub fn new(project: F) -> Self {
        Self {
            project,
            seen: HashMap::new(),
            listed: None,
        }
    }

    /// Feed one watch event, returning the objects that should trigger a reconcile.
    pub fn admit(&mut self, event: Event<K>) -> Vec<K> {
        match event {
            Event::Init => {
                self.listed = Some(HashSet::new());
                Vec::new()
            }
            Event::InitApply(obj) => {
                let key = ObjectKey::of(&obj);
                if let Some(listed) = self.listed.as_mut() {
                    listed.insert(key.clone());
                }
                self.remember(key, obj).into_iter().collect()
            }
            Event::InitDone => {
                let Some(listed) = self.listed.take() else {
                    return Vec::new();
                };
                let gone: Vec<ObjectKey> = self
                    .seen
                    .keys()
                    .filter(|key| !listed.contains(*key))
                    .cloned()
                    .collect();
                gone.iter()
                    .filter_map(|key| self.seen.remove(key))
                    .map(|(_, obj)| obj)
                    .collect()
            }
            Event::Apply(obj) => {
                let key = ObjectKey::of(&obj);
                self.remember(key, obj).into_iter().collect()
            }
            Event::Delete(obj) => {
                self.seen.remove(&ObjectKey::of(&obj));
                vec![obj]
            }
        }
    }

    /// Record the latest state of an object, returning it if its projection changed.
    fn remember(&mut self, key: ObjectKey, obj: K) -> Option<K> {
        let projection = (self.project)(&obj);
        let previous = self.seen.insert(key, (projection.clone(), obj.clone()));
        match previous {
            Some((previous, _)) if previous != projection => Some(obj),
            _ => None,
        }
    }

    /// Number of objects currently remembered.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.seen.len()
    }
}

/// Projection of a `ManifestWork` onto its spec.
#[must_use]
pub fn manifest_work_spec(work: &ManifestWork) -> Value {
    serde_json::to_value(&work.spec).unwrap_or(Value::Null)
}

/// The `ManagedCluster` owning a `ManifestWork`: the one named after its namespace.
#[must_use]
pub fn owning_cluster(work: &ManifestWork) -> Option<ObjectRef<ManagedCluster>> {
    work.namespace()
        .map(|namespace| ObjectRef::<ManagedCluster>::new(&namespace))
}

/// Stream of `ManifestWork` spec changes and deletions across all namespaces.
pub fn manifest_work_changes(
    client: Client,
) -> impl Stream<Item = Result<ManifestWork, watcher::Error>> + Send + 'static {
    let api: Api<ManifestWork> = Api::all(client);
    let mut filter = SpecChangeFilter::new(manifest_work_spec);

    watcher::watcher(api, watcher::Config::default()).flat_map(move |event| {
        let admitted = match event {
            Ok(event) => filter
                .admit(event)
                .into_iter()
                .map(|work| {
                    debug!(
                        manifest_work = %work.name_any(),
                        namespace = ?work.namespace(),
                        "ManifestWork spec changed or deleted"
                    );
                    Ok(work)
                })
                .collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(admitted)
    })
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
