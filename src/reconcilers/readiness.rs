// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rollout state of managed deployments.

use k8s_openapi::api::apps::v1::Deployment;
use tracing::debug;

use crate::errors::Result;
use crate::store::ObjectStore;

/// Rollout state of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every desired replica is ready and the deployment is `Available`
    Ready,
    /// Still rolling out, or not observed yet
    InProgress,
    /// `ReplicaFailure` is reported; carries the condition message
    Failed(String),
}

fn condition_true(deployment: &Deployment, condition_type: &str) -> Option<String> {
    deployment
        .status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == condition_type && c.status == "True")
        .map(|c| c.message.clone().unwrap_or_else(|| condition_type.to_string()))
}

/// Classify a deployment from its status.
///
/// A missing `spec.replicas` counts as 1, the API server default.
#[must_use]
pub fn deployment_readiness(deployment: &Deployment) -> Readiness {
    if let Some(message) = condition_true(deployment, "ReplicaFailure") {
        return Readiness::Failed(message);
    }
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    if ready == desired && condition_true(deployment, "Available").is_some() {
        Readiness::Ready
    } else {
        Readiness::InProgress
    }
}

/// Fetch a deployment and classify it; an absent deployment is in progress.
///
/// # Errors
///
/// Returns [`OperatorError::Store`](crate::errors::OperatorError::Store) when
/// the API call fails.
pub async fn check_deployment<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<Readiness> {
    let readiness = match store.get::<Deployment>(Some(namespace), name).await? {
        Some(deployment) => deployment_readiness(&deployment),
        None => Readiness::InProgress,
    };
    debug!(name = %name, readiness = ?readiness, "deployment readiness");
    Ok(readiness)
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod readiness_tests;
