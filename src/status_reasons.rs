// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition reasons and messages written by the import controller.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition
//! has a particular status.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ManagedClusterImportSucceeded
//!       status: "False"
//!       reason: ManagedClusterNotImported
//!       message: "connection refused: Unable to import prod-east"
//! ```

/// The import bundle was applied to the cluster
pub const REASON_IMPORTED: &str = "ManagedClusterImported";

/// The import attempt failed
pub const REASON_NOT_IMPORTED: &str = "ManagedClusterNotImported";

/// Message recorded on a successful import
pub const MESSAGE_IMPORT_SUCCEEDED: &str = "Import succeeded";

/// Context appended to import failure messages
#[must_use]
pub fn import_failure_context(cluster_name: &str) -> String {
    format!("Unable to import {cluster_name}")
}
