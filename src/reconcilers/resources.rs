// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create-or-update helpers for managed resources.
//!
//! Every managed object goes through one of three paths:
//!
//! - [`reconcile_owned`] - get, then create, skip or merge-and-update based on
//!   the kind's [`Equivalent`] implementation
//! - [`reconcile_hashed_config_map`] - configmaps whose content fingerprint
//!   feeds a pod-template annotation
//! - [`reconcile_password_secret`] - generated cache passwords, which are
//!   never regenerated while present and re-fingerprinted on every pass
//!
//! Each call issues at most one write and logs exactly one line naming the
//! outcome, so convergence can be audited from the logs alone.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, info};

use crate::comparators::Equivalent;
use crate::errors::{OperatorError, Result};
use crate::fingerprint::fingerprint;
use crate::metrics::record_resource_action;
use crate::store::{ObjectStore, StoredObject};

/// Decision taken for one managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn report<K: StoredObject>(object: &K, outcome: Outcome) {
    let kind = K::kind(&());
    let name = object.name_any();
    info!(
        kind = %kind,
        name = %name,
        action = outcome.as_str(),
        "{kind} {name} {outcome}"
    );
    record_resource_action(&kind, outcome.as_str());
}

/// Create `desired` when absent, otherwise update it if the live copy is not
/// [`Equivalent`].
///
/// The update sends the live object with the desired owned fields merged in,
/// so server-populated fields and the `resourceVersion` are preserved.
///
/// # Errors
///
/// Returns [`OperatorError::Store`] when any API call fails.
pub async fn reconcile_owned<S, K>(store: &S, desired: &K) -> Result<Outcome>
where
    S: ObjectStore,
    K: StoredObject + Equivalent,
{
    let name = desired.name_any();
    let namespace = desired.namespace();

    let outcome = match store.get::<K>(namespace.as_deref(), &name).await? {
        None => {
            store.create(desired).await?;
            Outcome::Created
        }
        Some(existing) if existing.equivalent(desired) => Outcome::Skipped,
        Some(mut existing) => {
            existing.merge_from(desired);
            store.update(&existing).await?;
            Outcome::Updated
        }
    };
    report(desired, outcome);
    Ok(outcome)
}

/// Reconcile a configmap whose `data[key]` fingerprint is published under
/// `hash_key`.
///
/// The live content is re-fingerprinted rather than trusting the live
/// annotation, so an out-of-band edit of the data is repaired even when the
/// annotation was left alone.
///
/// # Returns
///
/// The fingerprint of the content now on the cluster, for the state cache.
///
/// # Errors
///
/// Returns [`OperatorError::Generation`] when `desired` lacks the annotation
/// and [`OperatorError::Store`] when an API call fails.
pub async fn reconcile_hashed_config_map<S: ObjectStore>(
    store: &S,
    desired: &ConfigMap,
    key: &str,
    hash_key: &str,
) -> Result<(Outcome, String)> {
    let name = desired.name_any();
    let desired_hash = desired
        .annotations()
        .get(hash_key)
        .cloned()
        .ok_or_else(|| {
            OperatorError::generation(
                format!("configmap {name}"),
                format!("missing {hash_key} annotation"),
            )
        })?;

    let outcome = match store
        .get::<ConfigMap>(desired.namespace().as_deref(), &name)
        .await?
    {
        None => {
            store.create(desired).await?;
            Outcome::Created
        }
        Some(mut existing) => {
            let live_hash = existing
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(|content| fingerprint(content.as_bytes()));
            let annotated = existing.annotations().get(hash_key) == Some(&desired_hash);
            if live_hash.as_ref() == Some(&desired_hash) && annotated {
                Outcome::Skipped
            } else {
                debug!(name = %name, "configmap content fingerprint changed");
                existing.merge_from(desired);
                store.update(&existing).await?;
                Outcome::Updated
            }
        }
    };
    report(desired, outcome);
    Ok((outcome, desired_hash))
}

/// What [`reconcile_password_secret`] manages.
pub struct PasswordSecret<'a> {
    /// Freshly generated secret, used only when none exists
    pub desired: Secret,
    /// Data key holding the password
    pub key: &'a str,
    /// Annotation carrying the password fingerprint
    pub hash_key: &'a str,
    /// Label selector matching earlier generations of this secret
    pub selector: &'a str,
    /// Secrets sharing the selector labels that must survive cleanup
    pub keep: &'a [&'a str],
}

/// Reconcile a generated password secret.
///
/// - Absent: earlier generations matching the selector are deleted (except
///   the secret itself and `keep`), then `desired` is created.
/// - Present: the password is never replaced. The live password bytes are
///   fingerprinted every pass and the annotation is rewritten only when it
///   no longer matches, so a rotation by another actor still propagates.
///
/// # Returns
///
/// The fingerprint of the password now on the cluster.
///
/// # Errors
///
/// Returns [`OperatorError::InvalidResource`] when a live secret has no
/// password and [`OperatorError::Store`] when an API call fails.
pub async fn reconcile_password_secret<S: ObjectStore>(
    store: &S,
    secret: PasswordSecret<'_>,
) -> Result<(Outcome, String)> {
    let desired = &secret.desired;
    let name = desired.name_any();
    let namespace = desired.namespace();

    let (outcome, hash) = match store.get::<Secret>(namespace.as_deref(), &name).await? {
        None => {
            let stale = store
                .list::<Secret>(namespace.as_deref(), Some(secret.selector))
                .await?;
            for old in stale {
                let old_name = old.name_any();
                if old_name == name || secret.keep.contains(&old_name.as_str()) {
                    continue;
                }
                info!(name = %old_name, "deleting previous generation of secret {name}");
                store.delete::<Secret>(namespace.as_deref(), &old_name).await?;
                record_resource_action("Secret", "deleted");
            }
            store.create(desired).await?;
            let hash = desired
                .annotations()
                .get(secret.hash_key)
                .cloned()
                .unwrap_or_default();
            (Outcome::Created, hash)
        }
        Some(mut existing) => {
            let password = existing
                .data
                .as_ref()
                .and_then(|d| d.get(secret.key))
                .ok_or_else(|| {
                    OperatorError::invalid(
                        "Secret",
                        name.clone(),
                        format!("missing key {}", secret.key),
                    )
                })?;
            let hash = fingerprint(&password.0);
            if existing.annotations().get(secret.hash_key) == Some(&hash) {
                (Outcome::Skipped, hash)
            } else {
                existing
                    .annotations_mut()
                    .insert(secret.hash_key.to_string(), hash.clone());
                store.update(&existing).await?;
                (Outcome::Updated, hash)
            }
        }
    };
    report(desired, outcome);
    Ok((outcome, hash))
}

/// Delete a managed object, treating absence as success.
///
/// # Errors
///
/// Returns [`OperatorError::Store`] when the API call fails.
pub async fn delete_owned<S, K>(store: &S, namespace: Option<&str>, name: &str) -> Result<bool>
where
    S: ObjectStore,
    K: StoredObject,
{
    if store.get::<K>(namespace, name).await?.is_none() {
        return Ok(false);
    }
    store.delete::<K>(namespace, name).await?;
    let kind = K::kind(&());
    info!(kind = %kind, name = %name, action = "deleted", "{kind} {name} deleted");
    record_resource_action(&kind, "deleted");
    Ok(true)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
