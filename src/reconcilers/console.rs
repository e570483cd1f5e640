// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Console UI subsystem (`ConsolePluginReady`).
//!
//! Besides the plugin workload, the plugin has to be listed in the
//! cluster-wide `Console` object before the web console loads it. That object
//! belongs to the console operator, so only `spec.plugins` is ever touched.

use tracing::{debug, info};

use crate::constants::{
    CONSOLE_CR_NAME, CONSOLE_UI_PLUGIN_NAME, CONSOLE_UI_SERVICE_CERT_SECRET_NAME,
};
use crate::context::{Context, PassInput};
use crate::errors::{OperatorError, Result};
use crate::external_types::{Console, ConsolePlugin};
use crate::generators::console::{
    build_console_config_map, build_console_deployment, build_console_network_policy,
    build_console_plugin, build_console_service,
};
use crate::metrics::record_resource_action;
use crate::reconcilers::external::wait_for_tls_fingerprint;
use crate::reconcilers::pipeline::{run_pipeline, ReconcileTask, TaskFuture};
use crate::reconcilers::resources::{delete_owned, reconcile_owned};
use crate::state_cache::StateCache;
use crate::store::ObjectStore;

fn config_map<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_console_config_map(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn service<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_console_service(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn tls_secret<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    _input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let hash = wait_for_tls_fingerprint(
            &ctx.store,
            ctx.namespace(),
            CONSOLE_UI_SERVICE_CERT_SECRET_NAME,
            ctx.options.tls_poll_interval,
            ctx.options.tls_wait_timeout,
        )
        .await?;
        cache.console_tls = Some(hash);
        Ok(())
    })
}

fn deployment<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_console_deployment(&input.cr, &ctx.options, cache);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

fn plugin<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_console_plugin(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn network_policy<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_console_network_policy(&input.cr, &ctx.options);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

fn activation<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    _input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        activate_console_plugin(&ctx.store).await?;
        Ok(())
    })
}

/// Add the plugin to the cluster `Console` plugin list.
///
/// # Returns
///
/// `true` when the `Console` object was updated.
///
/// # Errors
///
/// Returns [`OperatorError::MissingDependency`] when the `Console` object
/// does not exist and [`OperatorError::Store`] when an API call fails.
pub async fn activate_console_plugin<S: ObjectStore>(store: &S) -> Result<bool> {
    let mut console = store
        .get::<Console>(None, CONSOLE_CR_NAME)
        .await?
        .ok_or_else(|| OperatorError::missing("Console", CONSOLE_CR_NAME))?;

    if console.spec.plugins.iter().any(|p| p == CONSOLE_UI_PLUGIN_NAME) {
        debug!(plugin = %CONSOLE_UI_PLUGIN_NAME, "console plugin already active");
        return Ok(false);
    }

    console.spec.plugins.push(CONSOLE_UI_PLUGIN_NAME.to_string());
    store.update(&console).await?;
    info!(plugin = %CONSOLE_UI_PLUGIN_NAME, "activated console plugin");
    record_resource_action("Console", "updated");
    Ok(true)
}

/// Remove the plugin from the cluster `Console` and delete its
/// `ConsolePlugin` registration.
///
/// A missing `Console` object is not an error here: there is nothing left to
/// deactivate.
///
/// # Errors
///
/// Returns [`OperatorError::Store`] when an API call fails.
pub async fn deactivate_console_plugin<S: ObjectStore>(store: &S) -> Result<()> {
    if let Some(mut console) = store.get::<Console>(None, CONSOLE_CR_NAME).await? {
        let before = console.spec.plugins.len();
        console.spec.plugins.retain(|p| p != CONSOLE_UI_PLUGIN_NAME);
        if console.spec.plugins.len() != before {
            store.update(&console).await?;
            info!(plugin = %CONSOLE_UI_PLUGIN_NAME, "deactivated console plugin");
            record_resource_action("Console", "updated");
        }
    }
    delete_owned::<S, ConsolePlugin>(store, None, CONSOLE_UI_PLUGIN_NAME).await?;
    Ok(())
}

/// Console UI pipeline, in execution order.
#[must_use]
pub fn console_tasks<S: ObjectStore>() -> Vec<ReconcileTask<S>> {
    vec![
        ReconcileTask::new("reconcile console plugin config map", config_map::<S>),
        ReconcileTask::new("reconcile console plugin service", service::<S>),
        ReconcileTask::new("reconcile console plugin TLS secret", tls_secret::<S>),
        ReconcileTask::new("reconcile console plugin deployment", deployment::<S>),
        ReconcileTask::new("reconcile console plugin", plugin::<S>),
        ReconcileTask::new("reconcile console plugin network policy", network_policy::<S>),
        ReconcileTask::new("activate console plugin", activation::<S>),
    ]
}

/// Run the console UI pipeline.
///
/// # Errors
///
/// Returns the first failing task's error, wrapped with the task name.
pub async fn reconcile_console<S: ObjectStore>(
    ctx: &Context<S>,
    input: &PassInput,
    cache: &mut StateCache,
) -> Result<()> {
    run_pipeline(&console_tasks(), ctx, input, cache).await
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod console_tests;
