// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Lightspeed operator.
//!
//! Every failure surfaced by generators and reconcilers is an [`OperatorError`].
//! Variants are stable error kinds: callers (and tests) classify failures with
//! [`OperatorError::kind`] or [`OperatorError::root_kind`] instead of matching
//! on message text, while the `Display` form stays readable for status
//! conditions and logs.
//!
//! # Taxonomy
//!
//! - **Generation / certificate validation** - malformed input; nothing is
//!   written and the pass fails immediately
//! - **Store** - transient API server failures; retried by the controller's
//!   requeue with backoff, never retried inline
//! - **Missing dependency / invalid resource** - a referenced secret or
//!   configmap is absent or incomplete; surfaced through status conditions
//! - **Task** - wraps any of the above with the name of the pipeline step

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = OperatorError> = std::result::Result<T, E>;

/// Reasons a PEM payload is rejected as a CA certificate.
#[derive(Error, Debug)]
pub enum CertificateError {
    /// No PEM block was found in the payload
    #[error("no PEM encoded certificate found")]
    NoCertificate,

    /// A PEM block was found but it is not a certificate (e.g. a private key)
    #[error("unexpected PEM block {tag}, expected CERTIFICATE")]
    UnexpectedBlock { tag: String },

    /// The PEM armor itself is malformed
    #[error("invalid PEM encoding: {0}")]
    Pem(#[from] pem::PemError),

    /// The DER payload is not a parseable X.509 certificate
    #[error("invalid X.509 certificate: {reason}")]
    X509 { reason: String },
}

/// Errors produced while generating or reconciling managed resources.
#[derive(Error, Debug)]
pub enum OperatorError {
    /// A desired object or configuration document could not be produced.
    #[error("failed to generate {what}: {reason}")]
    Generation { what: String, reason: String },

    /// CA material referenced by the custom resource failed PEM/X.509 validation.
    ///
    /// `subject` names the role of the certificate (e.g. `additional CA`,
    /// `proxy CA`) and `name` the configmap key or configmap holding it.
    #[error("failed to validate {subject} certificate {name}: {source}")]
    CertificateValidation {
        subject: &'static str,
        name: String,
        #[source]
        source: CertificateError,
    },

    /// A referenced object does not exist.
    #[error("{kind} {name} not found")]
    MissingDependency { kind: String, name: String },

    /// An object exists but lacks required content, or its rollout failed.
    #[error("{kind} {name} is invalid: {reason}")]
    InvalidResource {
        kind: String,
        name: String,
        reason: String,
    },

    /// The object store rejected or failed a request.
    #[error("kubernetes API error: {0}")]
    Store(#[from] kube::Error),

    /// A JSON conversion of a resource failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bounded wait ran out of time.
    #[error("deadline exceeded after {elapsed:?} waiting for {what}")]
    DeadlineExceeded { what: String, elapsed: Duration },

    /// A pipeline step failed; `task` is the step's name.
    #[error("failed to {task}: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: Box<OperatorError>,
    },
}

/// Stable classification of an [`OperatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Generation,
    CertificateValidation,
    MissingDependency,
    InvalidResource,
    Store,
    Serialization,
    DeadlineExceeded,
    Task,
}

impl OperatorError {
    /// Kind of this error, without looking through task wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Generation { .. } => ErrorKind::Generation,
            Self::CertificateValidation { .. } => ErrorKind::CertificateValidation,
            Self::MissingDependency { .. } => ErrorKind::MissingDependency,
            Self::InvalidResource { .. } => ErrorKind::InvalidResource,
            Self::Store(_) => ErrorKind::Store,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Task { .. } => ErrorKind::Task,
        }
    }

    /// Kind of the innermost error once every task wrapper is peeled off.
    #[must_use]
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            Self::Task { source, .. } => source.root_kind(),
            other => other.kind(),
        }
    }

    /// Name of the outermost failing pipeline step, if any.
    #[must_use]
    pub fn task_name(&self) -> Option<&'static str> {
        match self {
            Self::Task { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Wrap this error with the name of the step that produced it.
    #[must_use]
    pub fn in_task(self, task: &'static str) -> Self {
        Self::Task {
            task,
            source: Box::new(self),
        }
    }

    /// Whether the controller should expect a later pass to succeed without a
    /// configuration change.
    ///
    /// Store failures and expired waits are transient. Everything else needs
    /// the custom resource or a referenced object to change first.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root_kind(),
            ErrorKind::Store | ErrorKind::DeadlineExceeded
        )
    }

    pub(crate) fn missing(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingDependency {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub(crate) fn invalid(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidResource {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn generation(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Generation {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
