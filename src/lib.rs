// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Lightspeed Operator - OpenShift Lightspeed for Kubernetes
//!
//! The operator reconciles the cluster-scoped `OLSConfig` custom resource into
//! a running OpenShift Lightspeed deployment: the API server, a Postgres or
//! Redis conversation cache, and the web console plugin, together with their
//! configuration, TLS material, RBAC and monitoring objects.
//!
//! ## Overview
//!
//! Every pass regenerates the desired state of each managed object from the
//! custom resource, the content of referenced Secrets and ConfigMaps, the
//! cluster version and the startup options. Objects are created when absent,
//! repaired when they drift, and left alone otherwise. Content that pods
//! consume is fingerprinted, and the fingerprints ride on the pod templates so
//! that only a real content change restarts a workload.
//!
//! ## Modules
//!
//! - [`crd`] - the `OLSConfig` custom resource
//! - [`external_types`] - the foreign CRDs the operator reads or writes
//! - [`reconcilers`] - the top-level pass and the per-subsystem pipelines
//! - [`generators`] - pure builders of every managed object
//! - [`config_file`] - the `olsconfig.yaml` document read by the app server
//! - [`comparators`] - per-kind equality verdicts used before updating
//! - [`store`] - object store abstraction with Kubernetes and in-memory backends
//! - [`fingerprint`] - content fingerprints for rolling-update triggers
//! - [`certificates`] - PEM CA bundle validation
//! - [`watchers`] - mapping of unowned Secret/ConfigMap events to reconciles
//! - [`metrics`] and [`server`] - Prometheus metrics and the HTTP endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use lightspeed_operator::crd::{LlmSpec, OLSConfig, OLSConfigSpec, OlsSpec};
//!
//! let cr = OLSConfig::new(
//!     "cluster",
//!     OLSConfigSpec {
//!         llm: LlmSpec::default(),
//!         ols: OlsSpec {
//!             default_model: "granite".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     },
//! );
//! assert_eq!(cr.metadata.name.as_deref(), Some("cluster"));
//! ```

pub mod certificates;
pub mod comparators;
pub mod config_file;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod external_types;
pub mod fingerprint;
pub mod generators;
pub mod labels;
pub mod metrics;
pub mod options;
pub mod reconcilers;
pub mod server;
pub mod state_cache;
pub mod status_reasons;
pub mod store;
pub mod watchers;

#[cfg(test)]
mod status_reasons_tests;
#[cfg(test)]
mod test_fixtures;
