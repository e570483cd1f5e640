// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The operator's own monitoring and network objects.
//!
//! Reconciled at the start of every pass for any `OLSConfig` name, before the
//! custom resource is looked up, so they exist even when no `cluster`
//! resource does.

use k8s_openapi::api::apps::v1::Deployment;
use tracing::debug;

use crate::constants::OPERATOR_DEPLOYMENT_NAME;
use crate::context::Context;
use crate::errors::{OperatorError, Result};
use crate::generators::operator::{build_operator_network_policy, build_operator_service_monitor};
use crate::reconcilers::resources::reconcile_owned;
use crate::store::ObjectStore;

/// Reconcile the operator service monitor and network policy.
///
/// # Errors
///
/// Returns the first store failure, wrapped with the name of the object
/// being reconciled.
pub async fn reconcile_operator_assets<S: ObjectStore>(ctx: &Context<S>) -> Result<()> {
    let owner = ctx
        .store
        .get::<Deployment>(Some(ctx.namespace()), OPERATOR_DEPLOYMENT_NAME)
        .await
        .map_err(|e| OperatorError::from(e).in_task("reconcile operator service monitor"))?;
    if owner.is_none() {
        debug!(
            deployment = OPERATOR_DEPLOYMENT_NAME,
            "operator deployment not found, service monitor left unowned"
        );
    }

    let monitor = build_operator_service_monitor(&ctx.options, owner.as_ref());
    reconcile_owned(&ctx.store, &monitor)
        .await
        .map_err(|e| e.in_task("reconcile operator service monitor"))?;

    reconcile_owned(&ctx.store, &build_operator_network_policy(&ctx.options))
        .await
        .map_err(|e| e.in_task("reconcile operator network policy"))?;
    Ok(())
}

#[cfg(test)]
#[path = "operator_tests.rs"]
mod operator_tests;
