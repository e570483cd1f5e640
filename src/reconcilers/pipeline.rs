// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ordered task pipelines.
//!
//! A subsystem is reconciled by running its [`ReconcileTask`]s in order.
//! Later tasks read fingerprints that earlier tasks stored in the
//! [`StateCache`] (the deployment step needs the configmap and secret
//! hashes), so the order of a pipeline is part of its contract.
//!
//! The first failing task stops the pipeline. Its error is wrapped with the
//! task name, so the status condition reads `failed to <task>: <cause>`.
//! Tasks that already ran keep their effects; the next pass re-applies them
//! idempotently.

use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::context::{Context, PassInput};
use crate::errors::Result;
use crate::state_cache::StateCache;
use crate::store::ObjectStore;

/// Boxed future returned by a task.
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Signature of a task body.
pub type TaskFn<S> =
    for<'a> fn(&'a Context<S>, &'a PassInput, &'a mut StateCache) -> TaskFuture<'a>;

/// A named pipeline step.
pub struct ReconcileTask<S> {
    /// Human readable step name, used verbatim in error messages
    pub name: &'static str,
    pub run: TaskFn<S>,
}

impl<S> ReconcileTask<S> {
    #[must_use]
    pub const fn new(name: &'static str, run: TaskFn<S>) -> Self {
        Self { name, run }
    }
}

impl<S> Clone for ReconcileTask<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for ReconcileTask<S> {}

impl<S> std::fmt::Debug for ReconcileTask<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Run `tasks` in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the first task error wrapped with
/// [`OperatorError::in_task`](crate::errors::OperatorError::in_task).
pub async fn run_pipeline<S: ObjectStore>(
    tasks: &[ReconcileTask<S>],
    ctx: &Context<S>,
    input: &PassInput,
    cache: &mut StateCache,
) -> Result<()> {
    for task in tasks {
        debug!(task = task.name, "running reconcile task");
        if let Err(err) = (task.run)(ctx, input, &mut *cache).await {
            warn!(task = task.name, error = %err, "reconcile task failed");
            return Err(err.in_task(task.name));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
