// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! App server subsystem (`ApiReady`).
//!
//! The pipeline validates the LLM credentials, lays down RBAC, the
//! configuration document, networking and monitoring objects, and finishes
//! with the deployment. Every fingerprint the deployment template carries is
//! recorded by an earlier task of this pipeline, except the cache password,
//! which the cache subsystem records before this pipeline runs. When that
//! subsystem failed, the fingerprint already on the live template is kept.

use k8s_openapi::api::apps::v1::Deployment;
use tracing::debug;

use crate::constants::{APP_SERVER_DEPLOYMENT_NAME, OLS_CONFIG_FILENAME, OLS_CONFIG_HASH_KEY};
use crate::context::{Context, PassInput};
use crate::errors::Result;
use crate::fingerprint::string_map_fingerprint;
use crate::generators::app_server::{
    build_metrics_reader_secret, build_network_policy, build_ols_config_map,
    build_prometheus_rule, build_sar_cluster_role, build_sar_cluster_role_binding, build_service,
    build_service_account, build_service_monitor,
};
use crate::generators::app_server_deployment::{
    build_app_server_deployment, cache_secret_hash_key,
};
use crate::reconcilers::external::{
    check_llm_credentials, load_referenced_certificates, wait_for_tls_fingerprint,
};
use crate::reconcilers::pipeline::{run_pipeline, ReconcileTask, TaskFuture};
use crate::reconcilers::resources::{reconcile_hashed_config_map, reconcile_owned};
use crate::state_cache::StateCache;
use crate::store::ObjectStore;

fn validate_llm_credentials<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let hash = check_llm_credentials(&ctx.store, ctx.namespace(), &input.cr).await?;
        cache.llm_provider = Some(hash);
        Ok(())
    })
}

fn service_account<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_service_account(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn sar_cluster_role<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_sar_cluster_role(&input.cr)).await?;
        Ok(())
    })
}

fn sar_cluster_role_binding<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_sar_cluster_role_binding(&input.cr, &ctx.options);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

fn ols_config_map<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let certificates =
            load_referenced_certificates(&ctx.store, ctx.namespace(), &input.cr.spec.ols).await?;
        // Generation validates every CA entry before anything is written.
        let desired = build_ols_config_map(input, &ctx.options, &certificates)?;
        let (_, hash) = reconcile_hashed_config_map(
            &ctx.store,
            &desired,
            OLS_CONFIG_FILENAME,
            OLS_CONFIG_HASH_KEY,
        )
        .await?;
        cache.app_config = Some(hash);
        cache.additional_ca = certificates.additional_ca.as_ref().map(string_map_fingerprint);
        cache.proxy_ca = certificates.proxy_ca.as_ref().map(string_map_fingerprint);
        Ok(())
    })
}

fn service<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_service(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn tls_secret<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let name = input.cr.spec.ols.tls_secret_name();
        let hash = wait_for_tls_fingerprint(
            &ctx.store,
            ctx.namespace(),
            name,
            ctx.options.tls_poll_interval,
            ctx.options.tls_wait_timeout,
        )
        .await?;
        debug!(secret = %name, "app server TLS fingerprint recorded");
        cache.app_tls = Some(hash);
        Ok(())
    })
}

fn metrics_reader_secret<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_metrics_reader_secret(&input.cr, &ctx.options);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

fn service_monitor<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_service_monitor(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn prometheus_rule<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_prometheus_rule(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn network_policy<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_network_policy(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn deployment<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        if cache.cache_secret.is_none() {
            cache.cache_secret = live_cache_secret_hash(ctx, input).await?;
        }
        let desired = build_app_server_deployment(input, &ctx.options, cache);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

/// Cache password fingerprint already on the live app server pod template.
///
/// Used when the cache subsystem failed before recording one this pass, so
/// the template keeps its annotation instead of rolling the pods twice.
async fn live_cache_secret_hash<S: ObjectStore>(
    ctx: &Context<S>,
    input: &PassInput,
) -> Result<Option<String>> {
    let key = cache_secret_hash_key(input.cr.spec.ols.conversation_cache.cache_type);
    let live = ctx
        .store
        .get::<Deployment>(Some(ctx.namespace()), APP_SERVER_DEPLOYMENT_NAME)
        .await?;
    let hash = live
        .and_then(|d| d.spec)
        .and_then(|spec| spec.template.metadata)
        .and_then(|meta| meta.annotations)
        .and_then(|mut annotations| annotations.remove(key));
    if hash.is_some() {
        debug!(key, "keeping live cache password fingerprint");
    }
    Ok(hash)
}

/// App server pipeline, in execution order.
#[must_use]
pub fn app_server_tasks<S: ObjectStore>() -> Vec<ReconcileTask<S>> {
    vec![
        ReconcileTask::new("validate LLM credentials", validate_llm_credentials::<S>),
        ReconcileTask::new("reconcile app server service account", service_account::<S>),
        ReconcileTask::new("reconcile SAR cluster role", sar_cluster_role::<S>),
        ReconcileTask::new("reconcile SAR cluster role binding", sar_cluster_role_binding::<S>),
        ReconcileTask::new("reconcile OLS config map", ols_config_map::<S>),
        ReconcileTask::new("reconcile app server service", service::<S>),
        ReconcileTask::new("reconcile app server TLS secret", tls_secret::<S>),
        ReconcileTask::new("reconcile metrics reader secret", metrics_reader_secret::<S>),
        ReconcileTask::new("reconcile app server service monitor", service_monitor::<S>),
        ReconcileTask::new("reconcile app server prometheus rule", prometheus_rule::<S>),
        ReconcileTask::new("reconcile app server network policy", network_policy::<S>),
        ReconcileTask::new("reconcile app server deployment", deployment::<S>),
    ]
}

/// Run the app server pipeline.
///
/// # Errors
///
/// Returns the first failing task's error, wrapped with the task name.
pub async fn reconcile_app_server<S: ObjectStore>(
    ctx: &Context<S>,
    input: &PassInput,
    cache: &mut StateCache,
) -> Result<()> {
    run_pipeline(&app_server_tasks(), ctx, input, cache).await
}

#[cfg(test)]
#[path = "app_server_tests.rs"]
mod app_server_tests;
