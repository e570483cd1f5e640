// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-pass scratch space carrying fingerprints between pipeline steps.
//!
//! A fresh [`StateCache`] is built at the start of every reconciliation pass
//! and dropped at its end. Upstream steps (configmaps, secrets) record the
//! fingerprint they computed or observed, and downstream steps (deployments)
//! read them to stamp pod-template annotations. Nothing here survives a pass,
//! so every pass recomputes from live cluster state.

/// Fingerprints computed during one reconciliation pass, one field per subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateCache {
    /// Generated `olsconfig.yaml` content
    pub app_config: Option<String>,
    /// Generated `postgresql.conf.sample` content
    pub postgres_config: Option<String>,
    /// App server TLS key pair
    pub app_tls: Option<String>,
    /// LLM provider credential secrets
    pub llm_provider: Option<String>,
    /// Postgres or redis password secret
    pub cache_secret: Option<String>,
    /// User additional CA configmap
    pub additional_ca: Option<String>,
    /// Proxy CA configmap
    pub proxy_ca: Option<String>,
    /// Console plugin TLS key pair
    pub console_tls: Option<String>,
}

impl StateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
