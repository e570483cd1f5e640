// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Top-level `OLSConfig` reconciliation.
//!
//! One pass resolves the cluster facts every generator needs, then runs the
//! console UI, conversation cache and app server pipelines in that order
//! against a fresh [`StateCache`]. Each subsystem gets one status condition;
//! a failing subsystem does not stop the ones after it, but the first error
//! is returned so that the controller backs off and retries.
//!
//! Callers must not run two passes for the same custom resource at once.
//! `kube::runtime::Controller` guarantees this per object key.

use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::constants::{
    APP_SERVER_DEPLOYMENT_NAME, CONSOLE_UI_DEPLOYMENT_NAME, DEPLOYMENT_IN_PROGRESS,
    OLS_CONFIG_NAME, POSTGRES_DEPLOYMENT_NAME, REDIS_DEPLOYMENT_NAME,
};
use crate::context::{Context, PassInput};
use crate::crd::{CacheType, Condition, OLSConfig};
use crate::errors::{OperatorError, Result};
use crate::metrics::{record_error, record_reconciliation};
use crate::options::OperatorOptions;
use crate::reconcilers::app_server::app_server_tasks;
use crate::reconcilers::console::{console_tasks, deactivate_console_plugin};
use crate::reconcilers::external::{
    annotate_referenced_objects, resolve_cluster_version, telemetry_enabled,
};
use crate::reconcilers::operator::reconcile_operator_assets;
use crate::reconcilers::pipeline::{run_pipeline, ReconcileTask};
use crate::reconcilers::postgres::postgres_tasks;
use crate::reconcilers::readiness::{check_deployment, Readiness};
use crate::reconcilers::redis::redis_tasks;
use crate::reconcilers::status::{set_condition, write_status};
use crate::state_cache::StateCache;
use crate::status_reasons::{
    failure_message, CONDITION_TYPE_API_READY, CONDITION_TYPE_CACHE_READY,
    CONDITION_TYPE_CONSOLE_PLUGIN_READY, CONDITION_TYPE_RECONCILED, MESSAGE_COMPONENTS_DEPLOYED,
    MESSAGE_CR_RECONCILED, REASON_RECONCILING, STATUS_FALSE, STATUS_TRUE,
};
use crate::store::ObjectStore;

/// How a reconciliation pass ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassResult {
    /// Not the `cluster` singleton
    Ignored,
    /// The custom resource is gone and the console plugin was deactivated
    Removed,
    /// Every subsystem is deployed and ready
    Converged,
    /// Some deployment is still rolling out
    InProgress,
}

impl PassResult {
    /// When the controller should run the next pass.
    #[must_use]
    pub fn requeue_after(self, options: &OperatorOptions) -> Option<Duration> {
        match self {
            Self::Converged => Some(options.reconcile_interval),
            Self::InProgress => Some(options.in_progress_requeue),
            Self::Ignored | Self::Removed => None,
        }
    }

    /// Metric label for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Removed => "removed",
            Self::Converged => "success",
            Self::InProgress => "in_progress",
        }
    }
}

/// A subsystem with its own pipeline, deployment and status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subsystem {
    Console,
    Postgres,
    Redis,
    AppServer,
}

impl Subsystem {
    fn in_order(cache_type: CacheType) -> [Self; 3] {
        let cache = match cache_type {
            CacheType::Postgres => Self::Postgres,
            CacheType::Redis => Self::Redis,
        };
        [Self::Console, cache, Self::AppServer]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Console => "console UI",
            Self::Postgres => "postgres server",
            Self::Redis => "redis server",
            Self::AppServer => "application server",
        }
    }

    fn condition_type(self) -> &'static str {
        match self {
            Self::Console => CONDITION_TYPE_CONSOLE_PLUGIN_READY,
            Self::Postgres | Self::Redis => CONDITION_TYPE_CACHE_READY,
            Self::AppServer => CONDITION_TYPE_API_READY,
        }
    }

    fn deployment(self) -> &'static str {
        match self {
            Self::Console => CONSOLE_UI_DEPLOYMENT_NAME,
            Self::Postgres => POSTGRES_DEPLOYMENT_NAME,
            Self::Redis => REDIS_DEPLOYMENT_NAME,
            Self::AppServer => APP_SERVER_DEPLOYMENT_NAME,
        }
    }

    fn tasks<S: ObjectStore>(self) -> Vec<ReconcileTask<S>> {
        match self {
            Self::Console => console_tasks(),
            Self::Postgres => postgres_tasks(),
            Self::Redis => redis_tasks(),
            Self::AppServer => app_server_tasks(),
        }
    }
}

/// Reconcile the custom resource `name`.
///
/// The operator's own service monitor and network policy are reconciled
/// first, for any name. Only `cluster` is reconciled further. The pass is
/// bounded by [`OperatorOptions::pass_deadline`].
///
/// # Errors
///
/// Returns the first error any step hit, after the status conditions have
/// been written, or [`OperatorError::DeadlineExceeded`] when the pass runs
/// out of time. A failure on the operator's own objects ends the pass before
/// the custom resource is read.
pub async fn reconcile_olsconfig<S: ObjectStore>(
    ctx: &Context<S>,
    name: &str,
) -> Result<PassResult> {
    if let Err(err) = reconcile_operator_assets(ctx).await {
        record_error(err.task_name(), &format!("{:?}", err.root_kind()));
        error!(error = %err, "failed to reconcile operator assets");
        return Err(err);
    }

    if name != OLS_CONFIG_NAME {
        info!(name = %name, "ignoring OLSConfig other than {OLS_CONFIG_NAME}");
        return Ok(PassResult::Ignored);
    }

    let start = Instant::now();
    let deadline = ctx.options.pass_deadline;
    let result = match tokio::time::timeout(deadline, reconcile_pass(ctx, name)).await {
        Ok(result) => result,
        Err(_) => {
            let err = OperatorError::DeadlineExceeded {
                what: "reconciliation pass".to_string(),
                elapsed: start.elapsed(),
            };
            record_pass_failure(ctx, name, &err).await;
            Err(err)
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(outcome) => {
            record_reconciliation(outcome.as_str(), duration);
            info!(
                name = %name,
                outcome = outcome.as_str(),
                duration_ms = duration.as_millis(),
                "reconciliation pass finished"
            );
        }
        Err(err) => {
            record_reconciliation("error", duration);
            record_error(err.task_name(), &format!("{:?}", err.root_kind()));
            error!(name = %name, error = %err, "reconciliation pass failed");
        }
    }
    result
}

async fn reconcile_pass<S: ObjectStore>(ctx: &Context<S>, name: &str) -> Result<PassResult> {
    let Some(cr) = ctx.store.get::<OLSConfig>(None, name).await? else {
        info!(name = %name, "OLSConfig not found, removing the console plugin");
        deactivate_console_plugin(&ctx.store).await?;
        return Ok(PassResult::Removed);
    };
    debug!(name = %name, generation = ?cr.metadata.generation, "reconciliation starts");

    let mut conditions = cr
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    let input = match prepare_input(ctx, cr.clone()).await {
        Ok(input) => input,
        Err(err) => {
            set_condition(
                &mut conditions,
                CONDITION_TYPE_RECONCILED,
                STATUS_FALSE,
                REASON_RECONCILING,
                &failure_message(&err),
            );
            persist_conditions(ctx, &cr, conditions).await;
            return Err(err);
        }
    };

    let mut cache = StateCache::new();
    let mut first_error: Option<OperatorError> = None;
    let mut all_ready = true;

    for subsystem in Subsystem::in_order(input.cr.spec.ols.conversation_cache.cache_type) {
        let (status, message) = match run_subsystem(ctx, &input, &mut cache, subsystem).await {
            Ok(Readiness::Ready) => (STATUS_TRUE, MESSAGE_COMPONENTS_DEPLOYED.to_string()),
            Ok(Readiness::InProgress) => {
                all_ready = false;
                (STATUS_FALSE, DEPLOYMENT_IN_PROGRESS.to_string())
            }
            // run_subsystem maps Failed to an error
            Ok(Readiness::Failed(_)) => unreachable!("run_subsystem never returns Ok(Failed)"),
            Err(err) => {
                all_ready = false;
                warn!(subsystem = subsystem.name(), error = %err, "subsystem failed");
                let message = failure_message(&err);
                first_error.get_or_insert(err);
                (STATUS_FALSE, message)
            }
        };
        set_condition(
            &mut conditions,
            subsystem.condition_type(),
            status,
            REASON_RECONCILING,
            &message,
        );
    }

    let (status, message) = match (&first_error, all_ready) {
        (Some(err), _) => (STATUS_FALSE, failure_message(err)),
        (None, true) => (STATUS_TRUE, MESSAGE_CR_RECONCILED.to_string()),
        (None, false) => (STATUS_FALSE, DEPLOYMENT_IN_PROGRESS.to_string()),
    };
    set_condition(
        &mut conditions,
        CONDITION_TYPE_RECONCILED,
        status,
        REASON_RECONCILING,
        &message,
    );

    if let Some(err) = first_error {
        persist_conditions(ctx, &cr, conditions).await;
        return Err(err);
    }
    write_status(&ctx.store, &cr, conditions).await?;

    Ok(if all_ready {
        PassResult::Converged
    } else {
        PassResult::InProgress
    })
}

/// Cluster facts and referenced-object bookkeeping shared by every pipeline.
async fn prepare_input<S: ObjectStore>(ctx: &Context<S>, cr: OLSConfig) -> Result<PassInput> {
    let version = resolve_cluster_version(&ctx.store, &ctx.options).await?;
    let telemetry_enabled = telemetry_enabled(&ctx.store).await?;
    let annotated = annotate_referenced_objects(&ctx.store, ctx.namespace(), &cr).await?;
    if annotated > 0 {
        debug!(count = annotated, "annotated referenced objects for watching");
    }
    Ok(PassInput {
        cr,
        version,
        telemetry_enabled,
    })
}

async fn run_subsystem<S: ObjectStore>(
    ctx: &Context<S>,
    input: &PassInput,
    cache: &mut StateCache,
    subsystem: Subsystem,
) -> Result<Readiness> {
    debug!(subsystem = subsystem.name(), "reconciling subsystem");
    run_pipeline(&subsystem.tasks(), ctx, input, cache).await?;
    match check_deployment(&ctx.store, ctx.namespace(), subsystem.deployment()).await? {
        Readiness::Failed(reason) => Err(OperatorError::invalid(
            "Deployment",
            subsystem.deployment(),
            reason,
        )),
        readiness => Ok(readiness),
    }
}

/// Marks the custom resource not reconciled after the pass was cut short.
///
/// The abandoned pass never got to write its conditions, so the ones already
/// on the live object are kept and only `Reconciled` changes.
async fn record_pass_failure<S: ObjectStore>(
    ctx: &Context<S>,
    name: &str,
    err: &OperatorError,
) {
    let cr = match ctx.store.get::<OLSConfig>(None, name).await {
        Ok(Some(cr)) => cr,
        Ok(None) => return,
        Err(get_err) => {
            warn!(error = %get_err, "failed to read OLSConfig for status update");
            return;
        }
    };
    let mut conditions = cr
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    set_condition(
        &mut conditions,
        CONDITION_TYPE_RECONCILED,
        STATUS_FALSE,
        REASON_RECONCILING,
        &failure_message(err),
    );
    persist_conditions(ctx, &cr, conditions).await;
}

/// Best-effort status write on the failure path; the pass error wins.
async fn persist_conditions<S: ObjectStore>(
    ctx: &Context<S>,
    cr: &OLSConfig,
    conditions: Vec<Condition>,
) {
    if let Err(err) = write_status(&ctx.store, cr, conditions).await {
        warn!(error = %err, "failed to update OLSConfig status");
    }
}

#[cfg(test)]
#[path = "olsconfig_tests.rs"]
mod olsconfig_tests;
