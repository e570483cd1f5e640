// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Redis conversation cache subsystem (`CacheReady`).

use crate::constants::{REDIS_PASSWORD_KEY, REDIS_SECRET_HASH_KEY};
use crate::context::{Context, PassInput};
use crate::errors::Result;
use crate::generators::redis::{
    build_redis_deployment, build_redis_network_policy, build_redis_secret, build_redis_service,
};
use crate::labels::redis_secret_selector;
use crate::reconcilers::pipeline::{run_pipeline, ReconcileTask, TaskFuture};
use crate::reconcilers::resources::{reconcile_owned, reconcile_password_secret, PasswordSecret};
use crate::state_cache::StateCache;
use crate::store::ObjectStore;

fn password_secret<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let selector = redis_secret_selector();
        let (_, hash) = reconcile_password_secret(
            &ctx.store,
            PasswordSecret {
                desired: build_redis_secret(&input.cr, &ctx.options),
                key: REDIS_PASSWORD_KEY,
                hash_key: REDIS_SECRET_HASH_KEY,
                selector: &selector,
                keep: &[],
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
        reconcile_owned(&ctx.store, &build_redis_service(&input.cr, &ctx.options)).await?;
        Ok(())
    })
}

fn network_policy<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    input: &'a PassInput,
    _cache: &'a mut StateCache,
) -> TaskFuture<'a> {
    Box::pin(async move {
        let desired = build_redis_network_policy(&input.cr, &ctx.options);
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
        let desired = build_redis_deployment(&input.cr, &ctx.options, cache);
        reconcile_owned(&ctx.store, &desired).await?;
        Ok(())
    })
}

/// Redis pipeline, in execution order.
#[must_use]
pub fn redis_tasks<S: ObjectStore>() -> Vec<ReconcileTask<S>> {
    vec![
        ReconcileTask::new("reconcile redis secret", password_secret::<S>),
        ReconcileTask::new("reconcile redis service", service::<S>),
        ReconcileTask::new("reconcile redis network policy", network_policy::<S>),
        ReconcileTask::new("reconcile redis deployment", deployment::<S>),
    ]
}

/// Run the redis pipeline.
///
/// # Errors
///
/// Returns the first failing task's error, wrapped with the task name.
pub async fn reconcile_redis<S: ObjectStore>(
    ctx: &Context<S>,
    input: &PassInput,
    cache: &mut StateCache,
) -> Result<()> {
    run_pipeline(&redis_tasks(), ctx, input, cache).await
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod redis_tests;
