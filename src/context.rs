// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `ManagedCluster` controller.
//!
//! The controller receives an `Arc<Context>` holding everything a reconcile
//! needs beyond the request itself:
//! - the object store used for every hub read and write
//! - the applier used for direct imports
//! - hub settings rendered into import bundles
//! - the metrics registry
//!
//! Nothing is held in process-wide state, so unit tests build a context around
//! in-memory fakes.

use crate::import::remote::{KubeRemoteApplier, RemoteApplier};
use crate::manifests::HubSettings;
use crate::metrics::Metrics;
use crate::store::{KubeStore, ObjectStore};

/// Shared context passed to the reconcilers.
pub struct Context<S = KubeStore, A = KubeRemoteApplier> {
    /// Object store for hub API operations
    pub store: S,

    /// Applies import bundles to clusters that cannot pull them
    pub applier: A,

    /// Hub endpoint and agent images
    pub hub: HubSettings,

    /// Metrics registry for observability
    pub metrics: Metrics,
}

impl<S, A> Context<S, A>
where
    S: ObjectStore,
    A: RemoteApplier,
{
    #[must_use]
    pub fn new(store: S, applier: A, hub: HubSettings, metrics: Metrics) -> Self {
        Self {
            store,
            applier,
            hub,
            metrics,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
