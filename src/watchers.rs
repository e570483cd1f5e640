// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Map changes of unowned Secrets and ConfigMaps to `OLSConfig` reconciles.
//!
//! The operator does not own the objects users reference (provider
//! credentials, CA bundles, TLS key pairs), so `owns` never sees them change.
//! Each reconcile pass stamps them with [`WATCHER_ANNOTATION_KEY`], and the
//! controller's `watches` mappers below turn an event on such an object back
//! into a reconcile of the custom resource named in the annotation.
//!
//! Two cluster objects matter without any annotation: the cluster root CA in
//! the operator namespace, which feeds `extra_ca`, and the global pull
//! secret, which gates telemetry.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::constants::{
    KUBE_ROOT_CA_CONFIGMAP_NAME, OLS_CONFIG_NAME, TELEMETRY_PULL_SECRET_NAME,
    TELEMETRY_PULL_SECRET_NAMESPACE, WATCHER_ANNOTATION_KEY,
};
use crate::crd::OLSConfig;

fn annotated_owner(annotations: &BTreeMap<String, String>) -> Option<ObjectRef<OLSConfig>> {
    annotations
        .get(WATCHER_ANNOTATION_KEY)
        .filter(|name| !name.is_empty())
        .map(|name| ObjectRef::new(name))
}

/// Custom resources to reconcile when `secret` changes.
#[must_use]
pub fn secret_requests(secret: &Secret) -> Vec<ObjectRef<OLSConfig>> {
    if secret.name_any() == TELEMETRY_PULL_SECRET_NAME
        && secret.namespace().as_deref() == Some(TELEMETRY_PULL_SECRET_NAMESPACE)
    {
        return vec![ObjectRef::new(OLS_CONFIG_NAME)];
    }
    annotated_owner(secret.annotations()).into_iter().collect()
}

/// Custom resources to reconcile when `config_map` changes.
///
/// `operator_namespace` scopes the cluster root CA: every namespace carries a
/// `kube-root-ca.crt`, only the operator's copy is mounted.
#[must_use]
pub fn config_map_requests(
    config_map: &ConfigMap,
    operator_namespace: &str,
) -> Vec<ObjectRef<OLSConfig>> {
    if config_map.name_any() == KUBE_ROOT_CA_CONFIGMAP_NAME
        && config_map.namespace().as_deref() == Some(operator_namespace)
    {
        return vec![ObjectRef::new(OLS_CONFIG_NAME)];
    }
    annotated_owner(config_map.annotations()).into_iter().collect()
}

#[cfg(test)]
#[path = "watchers_tests.rs"]
mod watchers_tests;
