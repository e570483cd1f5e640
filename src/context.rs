// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared controller context and per-pass inputs.
//!
//! The controller receives an `Arc<Context<KubeStore>>`; tests build a
//! `Context<MemoryStore>`. Everything a generator needs beyond the custom
//! resource itself travels in [`PassInput`], resolved once at the start of a
//! pass so the generated objects are a pure function of it.

use std::fmt;

use crate::crd::OLSConfig;
use crate::errors::{OperatorError, Result};
use crate::options::OperatorOptions;
use crate::store::ObjectStore;

/// Shared context passed to every reconciler.
#[derive(Clone)]
pub struct Context<S> {
    /// Object store for all API operations
    pub store: S,

    /// Options captured at startup
    pub options: OperatorOptions,
}

impl<S: ObjectStore> Context<S> {
    #[must_use]
    pub fn new(store: S, options: OperatorOptions) -> Self {
        Self { store, options }
    }

    /// Namespace of every managed workload.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }
}

/// OpenShift `major.minor` version, selecting the product docs index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcpVersion {
    pub major: String,
    pub minor: String,
}

impl OcpVersion {
    /// Parse `major.minor[.patch...]`.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::InvalidResource`] when fewer than two numeric
    /// components are present.
    pub fn parse(version: &str) -> Result<Self> {
        let mut parts = version.trim().split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor))
                if !major.is_empty()
                    && !minor.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit()) =>
            {
                Ok(Self {
                    major: major.to_string(),
                    minor: minor.to_string(),
                })
            }
            _ => Err(OperatorError::invalid(
                "cluster version",
                version,
                "expected major.minor",
            )),
        }
    }
}

impl fmt::Display for OcpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Inputs resolved once per reconciliation pass.
#[derive(Debug, Clone)]
pub struct PassInput {
    pub cr: OLSConfig,
    pub version: OcpVersion,
    /// Cluster telemetry is enabled (pull secret carries `cloud.openshift.com`)
    pub telemetry_enabled: bool,
}

impl PassInput {
    /// Whether the user data collector sidecar runs.
    ///
    /// Requires telemetry and at least one of feedback or transcripts enabled.
    #[must_use]
    pub fn data_collector_enabled(&self) -> bool {
        let collection = &self.cr.spec.ols.user_data_collection;
        (!collection.feedback_disabled || !collection.transcripts_disabled)
            && self.telemetry_enabled
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
