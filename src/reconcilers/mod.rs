// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the `OLSConfig` custom resource.
//!
//! A pass is driven by [`reconcile_olsconfig`] and split into three
//! subsystems, each an ordered pipeline of named tasks sharing one
//! [`StateCache`](crate::state_cache::StateCache):
//!
//! 1. **Console UI** ([`console`]) - plugin workload, `ConsolePlugin`
//!    registration and activation in the cluster `Console`
//! 2. **Conversation cache** ([`postgres`] or [`redis`]) - generated password,
//!    server configuration and workload
//! 3. **App server** ([`app_server`]) - LLM credentials, RBAC, `olsconfig.yaml`,
//!    monitoring and the API deployment
//!
//! Earlier tasks record content fingerprints that the deployment task of the
//! same pass stamps on its pod template, so a changed input rolls the pods
//! and an unchanged one leaves them alone.
//!
//! # Building Blocks
//!
//! - [`pipeline`] - task runner that stops at, and names, the first failure
//! - [`resources`] - create-or-update of a single managed object
//! - [`external`] - checks on objects other actors provide
//! - [`readiness`] - rollout state of a deployment
//! - [`status`] - condition bookkeeping and the single status write
//! - [`operator`] - the operator's own service monitor and network policy,
//!   reconciled before the custom resource is read
//!
//! # Example
//!
//! ```rust,no_run
//! use lightspeed_operator::context::Context;
//! use lightspeed_operator::options::OperatorOptions;
//! use lightspeed_operator::reconcilers::reconcile_olsconfig;
//! use lightspeed_operator::store::MemoryStore;
//!
//! async fn reconcile_once() -> anyhow::Result<()> {
//!     let ctx = Context::new(MemoryStore::new(), OperatorOptions::default());
//!     let outcome = reconcile_olsconfig(&ctx, "cluster").await?;
//!     println!("next pass in {:?}", outcome.requeue_after(&ctx.options));
//!     Ok(())
//! }
//! ```

pub mod app_server;
pub mod console;
pub mod external;
pub mod olsconfig;
pub mod operator;
pub mod pipeline;
pub mod postgres;
pub mod readiness;
pub mod redis;
pub mod resources;
pub mod status;

pub use console::{activate_console_plugin, deactivate_console_plugin};
pub use olsconfig::{reconcile_olsconfig, PassResult};
pub use pipeline::{run_pipeline, ReconcileTask};
pub use readiness::Readiness;
