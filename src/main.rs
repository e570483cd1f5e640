// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::{
    runtime::{controller, controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use lightspeed_operator::{
    context::Context,
    crd::OLSConfig,
    errors::OperatorError,
    options::{Args, OperatorOptions},
    reconcilers::reconcile_olsconfig,
    server,
    store::KubeStore,
    watchers::{config_map_requests, secret_requests},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Requeue delay after a failed pass.
const ERROR_REQUEUE: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] OperatorError);

type OperatorContext = Context<KubeStore>;

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("lightspeed-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_logging() {
    // Respects RUST_LOG (default info) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_logging();

    let options = OperatorOptions::from_args(args);
    info!(
        namespace = %options.namespace,
        cluster_version = ?options.cluster_version_override,
        "Starting OpenShift Lightspeed operator"
    );
    if !options.proxy_env.is_empty() {
        debug!(count = options.proxy_env.len(), "proxy environment captured");
    }

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let metrics_address = options.metrics_bind_address;
    let ctx = Arc::new(Context::new(KubeStore::new(client.clone()), options));

    // Both tasks should run forever; either one ending stops the process
    tokio::select! {
        result = run_olsconfig_controller(client, ctx) => {
            error!("CRITICAL: OLSConfig controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("OLSConfig controller exited unexpectedly without error")
        }
        result = server::serve(metrics_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}

/// Run the `OLSConfig` controller.
///
/// Owned objects trigger a reconcile through their owner reference; the
/// user-referenced Secrets and ConfigMaps go through the watcher mappers.
async fn run_olsconfig_controller(client: Client, ctx: Arc<OperatorContext>) -> Result<()> {
    info!("Starting OLSConfig controller");

    let namespace = ctx.options.namespace.clone();
    let api = Api::<OLSConfig>::all(client.clone());
    let owned = Config::default();

    let removal_ctx = ctx.clone();
    Controller::new(api, Config::default())
        .owns(
            Api::<Deployment>::namespaced(client.clone(), &namespace),
            owned.clone(),
        )
        .owns(
            Api::<Service>::namespaced(client.clone(), &namespace),
            owned.clone(),
        )
        .owns(
            Api::<ServiceAccount>::namespaced(client.clone(), &namespace),
            owned.clone(),
        )
        .owns(
            Api::<NetworkPolicy>::namespaced(client.clone(), &namespace),
            owned.clone(),
        )
        .owns(
            Api::<ConfigMap>::namespaced(client.clone(), &namespace),
            owned.clone(),
        )
        .owns(
            Api::<Secret>::namespaced(client.clone(), &namespace),
            owned.clone(),
        )
        .watches(Api::<Secret>::all(client.clone()), owned.clone(), |secret| {
            secret_requests(&secret)
        })
        .watches(Api::<ConfigMap>::all(client.clone()), owned, move |cm| {
            config_map_requests(&cm, &namespace)
        })
        .run(reconcile_wrapper, error_policy, ctx)
        .for_each(move |result| {
            let ctx = removal_ctx.clone();
            async move {
                match result {
                    Ok((obj, _)) => debug!(name = %obj.name, "reconcile finished"),
                    // A deleted custom resource is never handed to the
                    // reconciler; run the removal pass here instead.
                    Err(controller::Error::ObjectNotFound(obj)) => {
                        if let Err(e) = reconcile_olsconfig(&ctx, &obj.name).await {
                            error!(name = %obj.name, "Failed to remove console plugin: {e}");
                        }
                    }
                    Err(e) => warn!("controller error: {e}"),
                }
            }
        })
        .await;

    Ok(())
}

/// Reconcile wrapper for `OLSConfig`
async fn reconcile_wrapper(
    cr: Arc<OLSConfig>,
    ctx: Arc<OperatorContext>,
) -> Result<Action, ReconcileError> {
    let name = cr.name_any();
    debug!(name = %name, "Reconcile wrapper called for OLSConfig");

    let outcome = reconcile_olsconfig(&ctx, &name).await?;
    Ok(match outcome.requeue_after(&ctx.options) {
        Some(delay) => {
            debug!(name = %name, delay_secs = delay.as_secs(), "requeueing");
            Action::requeue(delay)
        }
        None => Action::await_change(),
    })
}

/// Error policy for the `OLSConfig` controller
fn error_policy(cr: Arc<OLSConfig>, err: &ReconcileError, _ctx: Arc<OperatorContext>) -> Action {
    warn!(name = %cr.name_any(), error = %err, "reconciliation failed, requeueing");
    Action::requeue(ERROR_REQUEUE)
}
