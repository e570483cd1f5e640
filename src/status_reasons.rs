// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types and reasons reported on `OLSConfig`.
//!
//! Each subsystem owns one condition type. The encompassing `Reconciled`
//! condition is only set to `True` once every subsystem reports ready.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ConsolePluginReady
//!       status: "True"
//!       reason: Reconciling
//!       message: "All components are successfully deployed"
//!     - type: CacheReady
//!       status: "False"
//!       reason: Reconciling
//!       message: "In Progress"
//!     - type: ApiReady
//!       status: "False"
//!       reason: Reconciling
//!       message: "Failed: failed to reconcile OLS config map: ..."
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// App server deployment and its supporting objects are ready.
pub const CONDITION_TYPE_API_READY: &str = "ApiReady";

/// Conversation cache backend (postgres or redis) is ready.
pub const CONDITION_TYPE_CACHE_READY: &str = "CacheReady";

/// Console UI plugin is deployed and activated.
pub const CONDITION_TYPE_CONSOLE_PLUGIN_READY: &str = "ConsolePluginReady";

/// The whole custom resource converged.
pub const CONDITION_TYPE_RECONCILED: &str = "Reconciled";

// ============================================================================
// Condition Status Values
// ============================================================================

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

// ============================================================================
// Reasons
// ============================================================================

/// Reason carried by every condition the reconciler writes.
///
/// Consumers of the status distinguish outcomes through `status` and
/// `message`, so a single stable reason is kept for compatibility.
pub const REASON_RECONCILING: &str = "Reconciling";

// ============================================================================
// Messages
// ============================================================================

/// Prefix of failure messages, followed by `: <error>`.
pub const MESSAGE_FAILED: &str = "Failed";

pub const MESSAGE_COMPONENTS_DEPLOYED: &str = "All components are successfully deployed";

pub const MESSAGE_CR_RECONCILED: &str = "Custom resource successfully reconciled";

/// Build the message of a failed condition.
#[must_use]
pub fn failure_message(err: &impl std::fmt::Display) -> String {
    format!("{MESSAGE_FAILED}: {err}")
}
