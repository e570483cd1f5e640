// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator options.
//!
//! [`Args`] is the command line / environment surface parsed by `clap` in the
//! binary. It is converted once into [`OperatorOptions`], the plain struct
//! injected into every reconciler and generator. Generators never read the
//! process environment themselves; proxy settings are captured here at
//! startup.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_NAMESPACE, DEFAULT_PASS_DEADLINE_SECS, DEFAULT_RECONCILE_INTERVAL_SECS,
    DEFAULT_TLS_POLL_INTERVAL_MILLIS, DEFAULT_TLS_WAIT_TIMEOUT_SECS, IN_PROGRESS_REQUEUE_SECS,
};

pub const DEFAULT_APP_SERVER_IMAGE: &str = "quay.io/openshift-lightspeed/lightspeed-service-api:latest";
pub const DEFAULT_CONSOLE_IMAGE: &str =
    "quay.io/openshift-lightspeed/lightspeed-console-plugin:latest";
pub const DEFAULT_POSTGRES_IMAGE: &str = "registry.redhat.io/rhel9/postgresql-16:latest";
pub const DEFAULT_REDIS_IMAGE: &str = "registry.redhat.io/rhel9/redis-7:latest";
pub const DEFAULT_MCP_SERVER_IMAGE: &str =
    "quay.io/openshift-lightspeed/openshift-mcp-server:latest";

/// Proxy variables forwarded to managed containers, in this order.
pub const PROXY_ENV_VARS: [&str; 6] = [
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "NO_PROXY",
    "no_proxy",
];

/// OpenShift Lightspeed operator
#[derive(Parser, Debug, Clone)]
#[command(name = "lightspeed-operator", version, about, long_about = None)]
pub struct Args {
    /// Namespace holding every managed workload
    #[arg(long, env = "WATCH_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Image of the lightspeed-service-api container
    #[arg(long, env = "RELATED_IMAGE_APP_SERVER", default_value = DEFAULT_APP_SERVER_IMAGE)]
    pub service_image: String,

    /// Image of the console plugin container
    #[arg(long, env = "RELATED_IMAGE_CONSOLE_PLUGIN", default_value = DEFAULT_CONSOLE_IMAGE)]
    pub console_image: String,

    /// Image of the postgres server
    #[arg(long, env = "RELATED_IMAGE_POSTGRES", default_value = DEFAULT_POSTGRES_IMAGE)]
    pub postgres_image: String,

    /// Image of the redis server
    #[arg(long, env = "RELATED_IMAGE_REDIS", default_value = DEFAULT_REDIS_IMAGE)]
    pub redis_image: String,

    /// Image of the OpenShift MCP server sidecar
    #[arg(long, env = "RELATED_IMAGE_MCP_SERVER", default_value = DEFAULT_MCP_SERVER_IMAGE)]
    pub openshift_mcp_server_image: String,

    /// Cluster version as `major.minor`; read from the `ClusterVersion` object when unset
    #[arg(long, env = "CLUSTER_VERSION")]
    pub cluster_version: Option<String>,

    /// Seconds between reconciliations of a converged `OLSConfig`
    #[arg(long, default_value_t = DEFAULT_RECONCILE_INTERVAL_SECS)]
    pub reconcile_interval: u64,

    /// Seconds before re-checking a deployment that is still rolling out
    #[arg(long, default_value_t = IN_PROGRESS_REQUEUE_SECS)]
    pub in_progress_requeue: u64,

    /// Milliseconds between checks for the app server TLS secret
    #[arg(long, default_value_t = DEFAULT_TLS_POLL_INTERVAL_MILLIS)]
    pub tls_poll_interval_ms: u64,

    /// Seconds to wait for the app server TLS secret before failing the pass
    #[arg(long, default_value_t = DEFAULT_TLS_WAIT_TIMEOUT_SECS)]
    pub tls_wait_timeout: u64,

    /// Seconds a whole reconciliation pass may take
    #[arg(long, default_value_t = DEFAULT_PASS_DEADLINE_SECS)]
    pub pass_deadline: u64,

    /// Address serving `/metrics` and `/healthz`
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub metrics_bind_address: SocketAddr,
}

/// Options injected into reconcilers and generators.
#[derive(Debug, Clone)]
pub struct OperatorOptions {
    pub namespace: String,
    pub app_server_image: String,
    pub console_image: String,
    pub postgres_image: String,
    pub redis_image: String,
    pub openshift_mcp_server_image: String,
    pub cluster_version_override: Option<String>,
    /// Proxy variables present at startup, ordered as [`PROXY_ENV_VARS`]
    pub proxy_env: Vec<(String, String)>,
    pub reconcile_interval: Duration,
    pub in_progress_requeue: Duration,
    pub tls_poll_interval: Duration,
    pub tls_wait_timeout: Duration,
    pub pass_deadline: Duration,
    pub metrics_bind_address: SocketAddr,
}

impl Default for OperatorOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            app_server_image: DEFAULT_APP_SERVER_IMAGE.to_string(),
            console_image: DEFAULT_CONSOLE_IMAGE.to_string(),
            postgres_image: DEFAULT_POSTGRES_IMAGE.to_string(),
            redis_image: DEFAULT_REDIS_IMAGE.to_string(),
            openshift_mcp_server_image: DEFAULT_MCP_SERVER_IMAGE.to_string(),
            cluster_version_override: None,
            proxy_env: Vec::new(),
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            in_progress_requeue: Duration::from_secs(IN_PROGRESS_REQUEUE_SECS),
            tls_poll_interval: Duration::from_millis(DEFAULT_TLS_POLL_INTERVAL_MILLIS),
            tls_wait_timeout: Duration::from_secs(DEFAULT_TLS_WAIT_TIMEOUT_SECS),
            pass_deadline: Duration::from_secs(DEFAULT_PASS_DEADLINE_SECS),
            metrics_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl OperatorOptions {
    /// Build options from parsed arguments, capturing the proxy environment.
    #[must_use]
    pub fn from_args(args: Args) -> Self {
        Self::from_args_with_env(args, |name| std::env::var(name).ok())
    }

    /// Build options from parsed arguments and an environment lookup.
    ///
    /// Empty proxy values are dropped.
    pub fn from_args_with_env<F>(args: Args, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let proxy_env = PROXY_ENV_VARS
            .iter()
            .filter_map(|name| {
                lookup(name)
                    .filter(|value| !value.is_empty())
                    .map(|value| ((*name).to_string(), value))
            })
            .collect();

        Self {
            namespace: args.namespace,
            app_server_image: args.service_image,
            console_image: args.console_image,
            postgres_image: args.postgres_image,
            redis_image: args.redis_image,
            openshift_mcp_server_image: args.openshift_mcp_server_image,
            cluster_version_override: args.cluster_version.filter(|v| !v.is_empty()),
            proxy_env,
            reconcile_interval: Duration::from_secs(args.reconcile_interval),
            in_progress_requeue: Duration::from_secs(args.in_progress_requeue),
            tls_poll_interval: Duration::from_millis(args.tls_poll_interval_ms),
            tls_wait_timeout: Duration::from_secs(args.tls_wait_timeout),
            pass_deadline: Duration::from_secs(args.pass_deadline),
            metrics_bind_address: args.metrics_bind_address,
        }
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod options_tests;
