// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Postgres conversation cache subsystem (`CacheReady`).
//!
//! The password secret is generated once and kept; its fingerprint lands in
//! the state cache so that both the postgres and the app server deployments
//! restart when another actor rotates it.

use crate::constants::{
    POSTGRES_BOOTSTRAP_SECRET_NAME, POSTGRES_CONFIG_HASH_KEY, POSTGRES_CONFIG_KEY,
    POSTGRES_PASSWORD_KEY, POSTGRES_SECRET_HASH_KEY,
};
use crate::context::{Context, PassInput};
use crate::errors::Result;
use crate::generators::postgres::{
    build_bootstrap_secret, build_postgres_config_map, build_postgres_deployment,
    build_postgres_network_policy, build_postgres_secret, build_postgres_service,
};
use crate::labels::postgres_secret_selector;
use crate::reconcilers::pipeline::{run_pipeline, ReconcileTask, TaskFuture};
use crate::reconcilers::resources::{
    reconcile_hashed_config_map, reconcile_owned, reconcile_password_secret, PasswordSecret,
};
use crate::state_cache::StateCache;
use crate::store::ObjectStore;

fn config_map<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_postgres_config_map(&input.cr, &ctx.options);
        let (_, hash) = reconcile_hashed_config_map(
            &ctx.store,
            &desired,
            POSTGRES_CONFIG_KEY,
            POSTGRES_CONFIG_HASH_KEY,
        )
        .await?;
        cache.postgres_config = Some(hash);
        Ok(())
    })
}

fn bootstrap_secret<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_bootstrap_secret(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn password_secret<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let selector = postgres_secret_selector();
        let (_, hash) = reconcile_password_secret(
            &ctx.store,
            PasswordSecret {
                desired: build_postgres_secret(&input.cr, &ctx.options),
                key: POSTGRES_PASSWORD_KEY,
                hash_key: POSTGRES_SECRET_HASH_KEY,
                selector: &selector,
                keep: &[POSTGRES_BOOTSTRAP_SECRET_NAME],
            },
        )
        .await?;
        cache.cache_secret = Some(hash);
        Ok(())
    })
}

fn service<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        reconcile_owned(&ctx.store, &build_postgres_service(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn network_policy<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_postgres_network_policy(&input.cr, &ctx.options);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

fn deployment<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_postgres_deployment(&input.cr, &ctx.options, cache);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

/// Postgres pipeline, in execution order.
#[must_use]
pub fn postgres_tasks<S: ObjectStore>() -> Vec<ReconcileTask<S>> {
    vec![
        ReconcileTask::new("reconcile postgres config map", config_map::<S>),
        ReconcileTask::new("reconcile postgres bootstrap secret", bootstrap_secret::<S>),
        ReconcileTask::new("reconcile postgres secret", password_secret::<S>),
        ReconcileTask::new("reconcile postgres service", service::<S>),
        ReconcileTask::new("reconcile postgres network policy", network_policy::<S>),
        ReconcileTask::new("reconcile postgres deployment", deployment::<S>),
    ]
}

/// Run the postgres pipeline.
///
/// # Errors
///
/// Returns the first failing task's error, wrapped with the task name.
pub async fn reconcile_postgres<S: ObjectStore>(
    ctx: &Context<S>,
    input: &PassInput,
    cache: &mut StateCache,
) -> Result<()> {
    run_pipeline(&postgres_tasks(), ctx, input, cache).await
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod postgres_tests;
