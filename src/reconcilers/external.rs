// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Checks and lookups against objects the operator does not own.
//!
//! Everything here reads secrets and configmaps created by users or by
//! other cluster components:
//!
//! - LLM provider credential secrets and their combined fingerprint
//! - TLS key pairs issued by the service CA (or supplied by the user)
//! - CA bundles referenced by the custom resource
//! - The cluster pull secret gating telemetry
//! - The cluster version selecting the product docs index
//!
//! The only writes are watcher annotations on referenced objects, which let
//! the controller requeue the custom resource when one of them changes.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::constants::{
    API_TOKEN_KEY, AZURE_CLIENT_ID_KEY, AZURE_CLIENT_SECRET_KEY, AZURE_OPENAI_TYPE,
    AZURE_TENANT_ID_KEY, DOCKER_CONFIG_JSON_KEY, KUBE_ROOT_CA_CONFIGMAP_NAME, OLS_CONFIG_NAME,
    TELEMETRY_AUTH_HOST, TELEMETRY_PULL_SECRET_NAME, TELEMETRY_PULL_SECRET_NAMESPACE,
    TLS_CERT_FILE, TLS_KEY_FILE, WATCHER_ANNOTATION_KEY,
};
use crate::config_file::ReferencedCertificates;
use crate::context::OcpVersion;
use crate::crd::{OLSConfig, OlsSpec, ProviderSpec};
use crate::errors::{OperatorError, Result};
use crate::external_types::ClusterVersion;
use crate::fingerprint::{credentials_fingerprint, key_pair_fingerprint};
use crate::options::OperatorOptions;
use crate::store::{ObjectStore, StoredObject};

/// Name of the `ClusterVersion` singleton.
const CLUSTER_VERSION_NAME: &str = "version";

// ============================================================================
// LLM provider credentials
// ============================================================================

fn has_key(data: &BTreeMap<String, ByteString>, key: &str) -> bool {
    data.contains_key(key)
}

fn check_provider_keys(
    provider: &ProviderSpec,
    data: &BTreeMap<String, ByteString>,
) -> Result<()> {
    let secret_name = &provider.credentials_secret_ref.name;
    if has_key(data, API_TOKEN_KEY) {
        return Ok(());
    }
    if provider.provider_type == AZURE_OPENAI_TYPE {
        let missing: Vec<&str> = [AZURE_CLIENT_ID_KEY, AZURE_TENANT_ID_KEY, AZURE_CLIENT_SECRET_KEY]
            .into_iter()
            .filter(|key| !has_key(data, key))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        return Err(OperatorError::invalid(
            "Secret",
            secret_name,
            format!(
                "missing key {API_TOKEN_KEY} or Azure service principal keys {}",
                missing.join(", ")
            ),
        ));
    }
    Err(OperatorError::invalid(
        "Secret",
        secret_name,
        format!("missing key {API_TOKEN_KEY}"),
    ))
}

/// Verify every provider's credential secret and fingerprint their content.
///
/// Non-Azure providers need an `apitoken` key. Azure OpenAI providers need
/// either `apitoken` or the full service principal (`client_id`,
/// `tenant_id`, `client_secret`).
///
/// # Returns
///
/// The credentials fingerprint, hashed in provider declaration order.
///
/// # Errors
///
/// - [`OperatorError::MissingDependency`] naming the provider and secret when
///   a secret is absent
/// - [`OperatorError::InvalidResource`] when required keys are missing
/// - [`OperatorError::Store`] when the API call fails
pub async fn check_llm_credentials<S: ObjectStore>(
    store: &S,
    namespace: &str,
    cr: &OLSConfig,
) -> Result<String> {
    let mut contents = Vec::with_capacity(cr.spec.llm.providers.len());
    for provider in &cr.spec.llm.providers {
        let secret_name = &provider.credentials_secret_ref.name;
        let secret = store
            .get::<Secret>(Some(namespace), secret_name)
            .await?
            .ok_or_else(|| {
                OperatorError::missing(
                    format!("LLM provider {} credential secret", provider.name),
                    secret_name,
                )
            })?;
        let data = secret.data.unwrap_or_default();
        check_provider_keys(provider, &data)?;
        contents.push(data);
    }
    Ok(credentials_fingerprint(&contents))
}

// ============================================================================
// TLS key pairs
// ============================================================================

fn key_pair(secret: &Secret) -> Option<(&[u8], &[u8])> {
    let data = secret.data.as_ref()?;
    let key = data.get(TLS_KEY_FILE)?;
    let cert = data.get(TLS_CERT_FILE)?;
    Some((key.0.as_slice(), cert.0.as_slice()))
}

/// Wait for a TLS secret holding `tls.key` and `tls.crt`, then fingerprint it.
///
/// Service-CA-issued secrets appear shortly after their service is created,
/// so the secret is polled every `poll_interval` until `timeout` elapses.
///
/// # Errors
///
/// Returns [`OperatorError::DeadlineExceeded`] when the secret is still
/// absent or incomplete at the deadline, and [`OperatorError::Store`] when
/// an API call fails.
pub async fn wait_for_tls_fingerprint<S: ObjectStore>(
    store: &S,
    namespace: &str,
    secret_name: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<String> {
    let started = Instant::now();
    loop {
        if let Some(secret) = store.get::<Secret>(Some(namespace), secret_name).await? {
            if let Some((key, cert)) = key_pair(&secret) {
                return Ok(key_pair_fingerprint(key, cert));
            }
            debug!(name = %secret_name, "TLS secret has no key pair yet");
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(OperatorError::DeadlineExceeded {
                what: format!("TLS secret {secret_name}"),
                elapsed,
            });
        }
        tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
    }
}

// ============================================================================
// CA bundles
// ============================================================================

async fn config_map_data<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<BTreeMap<String, String>> {
    let cm = store
        .get::<ConfigMap>(Some(namespace), name)
        .await?
        .ok_or_else(|| OperatorError::missing("ConfigMap", name))?;
    Ok(cm.data.unwrap_or_default())
}

/// Fetch every CA configmap the generated configuration depends on.
///
/// Content is returned unvalidated; certificate validation happens while the
/// configuration document is built.
///
/// # Errors
///
/// Returns [`OperatorError::MissingDependency`] when `kube-root-ca.crt` or a
/// configmap referenced by the custom resource is absent.
pub async fn load_referenced_certificates<S: ObjectStore>(
    store: &S,
    namespace: &str,
    ols: &OlsSpec,
) -> Result<ReferencedCertificates> {
    let cluster_root_ca = config_map_data(store, namespace, KUBE_ROOT_CA_CONFIGMAP_NAME).await?;
    let additional_ca = match ols.additional_ca_name() {
        Some(name) => Some(config_map_data(store, namespace, name).await?),
        None => None,
    };
    let proxy_ca = match ols.proxy_ca_name() {
        Some(name) => Some(config_map_data(store, namespace, name).await?),
        None => None,
    };
    Ok(ReferencedCertificates {
        cluster_root_ca,
        additional_ca,
        proxy_ca,
    })
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, serde_json::Value>,
}

/// Whether cluster telemetry is enabled.
///
/// Telemetry is on when the cluster pull secret carries credentials for
/// `cloud.openshift.com`. A missing pull secret means telemetry is off.
///
/// # Errors
///
/// Returns [`OperatorError::InvalidResource`] when the pull secret lacks
/// `.dockerconfigjson` or it is not valid JSON.
pub async fn telemetry_enabled<S: ObjectStore>(store: &S) -> Result<bool> {
    let Some(secret) = store
        .get::<Secret>(
            Some(TELEMETRY_PULL_SECRET_NAMESPACE),
            TELEMETRY_PULL_SECRET_NAME,
        )
        .await?
    else {
        return Ok(false);
    };

    let invalid = |reason: String| {
        OperatorError::invalid("Secret", TELEMETRY_PULL_SECRET_NAME, reason)
    };
    let raw = secret
        .data
        .as_ref()
        .and_then(|d| d.get(DOCKER_CONFIG_JSON_KEY))
        .ok_or_else(|| invalid(format!("missing key {DOCKER_CONFIG_JSON_KEY}")))?;
    let config: DockerConfig =
        serde_json::from_slice(&raw.0).map_err(|e| invalid(e.to_string()))?;
    Ok(config.auths.contains_key(TELEMETRY_AUTH_HOST))
}

// ============================================================================
// Cluster version
// ============================================================================

/// Resolve the cluster `major.minor` version.
///
/// The configured override wins; otherwise the desired release of the
/// `ClusterVersion` singleton is used.
///
/// # Errors
///
/// Returns [`OperatorError::MissingDependency`] when no version can be found
/// and [`OperatorError::InvalidResource`] when it does not parse.
pub async fn resolve_cluster_version<S: ObjectStore>(
    store: &S,
    options: &OperatorOptions,
) -> Result<OcpVersion> {
    if let Some(version) = &options.cluster_version_override {
        return OcpVersion::parse(version);
    }
    let version = store
        .get::<ClusterVersion>(None, CLUSTER_VERSION_NAME)
        .await?
        .and_then(|cv| cv.status)
        .and_then(|status| status.desired)
        .map(|release| release.version)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OperatorError::missing("ClusterVersion", CLUSTER_VERSION_NAME))?;
    OcpVersion::parse(&version)
}

// ============================================================================
// Watcher annotations
// ============================================================================

async fn annotate_if_needed<S, K>(store: &S, namespace: &str, name: &str) -> Result<bool>
where
    S: ObjectStore,
    K: StoredObject,
{
    let Some(mut object) = store.get::<K>(Some(namespace), name).await? else {
        return Ok(false);
    };
    if object.annotations().contains_key(WATCHER_ANNOTATION_KEY) {
        return Ok(false);
    }
    object
        .annotations_mut()
        .insert(WATCHER_ANNOTATION_KEY.to_string(), OLS_CONFIG_NAME.to_string());
    store.update(&object).await?;
    info!(kind = %K::kind(&()), name = %name, "annotated for change tracking");
    Ok(true)
}

/// Put the watcher annotation on every secret and configmap the custom
/// resource references.
///
/// Objects that do not exist yet are skipped; they are annotated on a later
/// pass. Objects already carrying the annotation are not written.
///
/// # Returns
///
/// Number of objects annotated.
///
/// # Errors
///
/// Returns [`OperatorError::Store`] when an API call fails.
pub async fn annotate_referenced_objects<S: ObjectStore>(
    store: &S,
    namespace: &str,
    cr: &OLSConfig,
) -> Result<usize> {
    let ols = &cr.spec.ols;
    let mut secrets: Vec<&str> = cr
        .spec
        .llm
        .providers
        .iter()
        .map(|p| p.credentials_secret_ref.name.as_str())
        .collect();
    if ols.has_user_tls() {
        secrets.push(ols.tls_secret_name());
    }
    let config_maps: Vec<&str> = ols
        .additional_ca_name()
        .into_iter()
        .chain(ols.proxy_ca_name())
        .collect();

    let mut annotated = 0;
    for name in secrets {
        annotated += usize::from(annotate_if_needed::<S, Secret>(store, namespace, name).await?);
    }
    for name in config_maps {
        annotated +=
            usize::from(annotate_if_needed::<S, ConfigMap>(store, namespace, name).await?);
    }
    Ok(annotated)
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod external_tests;
