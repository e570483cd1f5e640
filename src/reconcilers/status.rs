// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `OLSConfig`.
//!
//! Conditions are assembled in memory during a pass and written once at the
//! end through [`write_status`], which skips the API call when nothing
//! semantically changed. `lastTransitionTime` only moves when a condition's
//! `status` flips.
//!
//! # Example
//!
//! ```rust,no_run
//! use lightspeed_operator::reconcilers::status::create_condition;
//!
//! let condition = create_condition("ApiReady", "True", "Reconciling", "All components are successfully deployed");
//! assert_eq!(condition.status, "True");
//! ```

use chrono::Utc;
use kube::ResourceExt;
use tracing::debug;

use crate::crd::{Condition, OLSConfig, OLSConfigStatus};
use crate::errors::Result;
use crate::store::ObjectStore;

/// Create a new condition stamped with the current time.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "ApiReady")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
///
/// # Returns
///
/// A new `Condition` with the current timestamp.
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
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place (no API call).
///
/// The existing `lastTransitionTime` is kept when the status is unchanged.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(Utc::now().to_rfc3339());
        }
        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Whether two condition lists carry the same type, status, reason and
/// message for every entry, ignoring transition times and order.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|wanted| {
            find_condition(current, &wanted.r#type).is_some_and(|c| {
                c.status == wanted.status
                    && c.reason == wanted.reason
                    && c.message == wanted.message
            })
        })
}

/// Persist `conditions` on the custom resource, unless they are already there.
///
/// # Returns
///
/// `true` when a status write was issued.
///
/// # Errors
///
/// Returns [`OperatorError::Store`](crate::errors::OperatorError::Store) when
/// the status write fails.
pub async fn write_status<S: ObjectStore>(
    store: &S,
    cr: &OLSConfig,
    conditions: Vec<Condition>,
) -> Result<bool> {
    let current = cr
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();
    if conditions_equal(current, &conditions) {
        debug!(name = %cr.name_any(), "status unchanged, skipping write");
        return Ok(false);
    }

    let mut updated = cr.clone();
    updated.status = Some(OLSConfigStatus { conditions });
    store.update_status(&updated).await?;
    debug!(name = %cr.name_any(), "status updated");
    Ok(true)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
