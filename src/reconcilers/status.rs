// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the import condition recorder.
//!
//! # Condition Format
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: The aspect of the resource being reported
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last changed
//!
//! Conditions are keyed by type: setting a condition replaces the existing one
//! of the same type and leaves the others untouched.

use crate::constants::{CONDITION_IMPORT_SUCCEEDED, STATUS_FALSE, STATUS_TRUE};
use crate::crd::{Condition, ManagedCluster};
use crate::status_reasons::{MESSAGE_IMPORT_SUCCEEDED, REASON_IMPORTED, REASON_NOT_IMPORTED};
use crate::store::{ObjectKey, ObjectStore};
use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

/// Create a new condition with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Set a condition in place, keyed by type.
///
/// `lastTransitionTime` is preserved unless the status changes.
pub fn update_condition_in_memory(conditions: &mut Vec<Condition>, new_condition: Condition) {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.r#type == new_condition.r#type)
    {
        if existing.status != new_condition.status || existing.last_transition_time.is_none() {
            existing.last_transition_time = new_condition.last_transition_time;
        }
        existing.status = new_condition.status;
        existing.reason = new_condition.reason;
        existing.message = new_condition.message;
    } else {
        conditions.push(new_condition);
    }
}

/// Compare two condition lists, ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|n| {
            find_condition(current, &n.r#type).is_some_and(|c| {
                c.status == n.status && c.reason == n.reason && c.message == n.message
            })
        })
}

/// The import outcome condition for `error`, with `context` appended to failure messages.
#[must_use]
pub fn import_condition(error: Option<&anyhow::Error>, context: &str) -> Condition {
    match error {
        None => create_condition(
            CONDITION_IMPORT_SUCCEEDED,
            STATUS_TRUE,
            REASON_IMPORTED,
            MESSAGE_IMPORT_SUCCEEDED,
        ),
        Some(err) => {
            let mut message = format!("{err:#}");
            if !context.is_empty() {
                message.push_str(": ");
                message.push_str(context);
            }
            create_condition(
                CONDITION_IMPORT_SUCCEEDED,
                STATUS_FALSE,
                REASON_NOT_IMPORTED,
                &message,
            )
        }
    }
}

/// Record the outcome of an import attempt on the cluster status.
///
/// Conditions are computed from `cluster` as it was before the import ran, and
/// written with a merge patch on the status subresource. Nothing is written when
/// the condition is already current.
///
/// # Errors
///
/// Returns an error if the status patch fails.
pub async fn record_import_condition<S>(
    store: &S,
    cluster: &ManagedCluster,
    error: Option<&anyhow::Error>,
    context: &str,
) -> Result<()>
where
    S: ObjectStore + ?Sized,
{
    let current = cluster
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    let mut conditions = current.clone();
    update_condition_in_memory(&mut conditions, import_condition(error, context));

    let key = ObjectKey::of(cluster);
    if conditions_equal(&current, &conditions) {
        debug!(cluster = %key, "Import condition unchanged, skipping status update");
        return Ok(());
    }

    let patch = json!({ "status": { "conditions": conditions } });
    store
        .merge_patch_status::<ManagedCluster>(&key, &patch)
        .await?;

    debug!(cluster = %key, succeeded = error.is_none(), "Recorded import condition");
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
