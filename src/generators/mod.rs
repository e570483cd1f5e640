// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state builders for every managed resource.
//!
//! Each `build_*` function is pure: its output depends only on the
//! [`PassInput`](crate::context::PassInput), the
//! [`OperatorOptions`](crate::options::OperatorOptions), content read from
//! referenced objects, and fingerprints already recorded in the
//! [`StateCache`](crate::state_cache::StateCache). Nothing here talks to the
//! API server, so every generator is tested without a store.
//!
//! # Submodules
//!
//! - [`app_server`] - app server `ConfigMap`, RBAC, `Service`, monitoring and `NetworkPolicy`
//! - [`app_server_deployment`] - the app server `Deployment` with its sidecars
//! - [`postgres`] - postgres cache backend
//! - [`redis`] - redis cache backend
//! - [`console`] - console UI plugin
//! - [`operator`] - the operator's own `ServiceMonitor` and `NetworkPolicy`

pub mod app_server;
pub mod app_server_deployment;
pub mod console;
pub mod operator;
pub mod postgres;
pub mod redis;

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, EnvVar, ResourceRequirements,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::constants::{API_GROUP, API_VERSION, KIND_OLS_CONFIG, VOLUME_DEFAULT_MODE};
use crate::crd::OLSConfig;
use crate::options::OperatorOptions;

/// Builds owner references for a resource owned by the `OLSConfig`.
///
/// The custom resource is cluster scoped, so both namespaced and cluster
/// scoped children may point at it and are garbage collected with it.
///
/// # Arguments
///
/// * `cr` - The `OLSConfig` that owns the resource
///
/// # Returns
///
/// A vector containing a single controller `OwnerReference`
#[must_use]
pub fn build_owner_references(cr: &OLSConfig) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: format!("{API_GROUP}/{API_VERSION}"),
        kind: KIND_OLS_CONFIG.to_string(),
        name: cr.name_any(),
        uid: cr.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Metadata shared by all generated objects: name, optional namespace, labels
/// and the owner reference back to the custom resource.
pub(crate) fn owned_meta(
    name: &str,
    namespace: Option<&str>,
    labels: BTreeMap<String, String>,
    cr: &OLSConfig,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        labels: Some(labels),
        owner_references: Some(build_owner_references(cr)),
        ..Default::default()
    }
}

/// Proxy environment captured at startup, in capture order.
#[must_use]
pub fn proxy_env(options: &OperatorOptions) -> Vec<EnvVar> {
    options
        .proxy_env
        .iter()
        .map(|(name, value)| env_var(name, value))
        .collect()
}

pub(crate) fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

pub(crate) fn quantities(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, Quantity>> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), Quantity((*value).to_string())))
            .collect(),
    )
}

/// Resource requirements from explicit limits and requests.
pub(crate) fn resources(limits: &[(&str, &str)], requests: &[(&str, &str)]) -> ResourceRequirements {
    ResourceRequirements {
        limits: quantities(limits),
        requests: quantities(requests),
        ..Default::default()
    }
}

/// The custom resource's requirements when set, `default` otherwise.
pub(crate) fn resources_or_default(
    custom: Option<&ResourceRequirements>,
    default: ResourceRequirements,
) -> ResourceRequirements {
    custom.cloned().unwrap_or(default)
}

pub(crate) fn secret_volume(name: &str, secret_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_string()),
            default_mode: Some(VOLUME_DEFAULT_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn config_map_volume(name: &str, config_map_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name.to_string(),
            default_mode: Some(VOLUME_DEFAULT_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

pub(crate) fn mount(name: &str, path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: Some(read_only),
        ..Default::default()
    }
}

pub(crate) fn sub_path_mount(name: &str, path: &str, sub_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        sub_path: Some(sub_path.to_string()),
        read_only: Some(true),
        ..Default::default()
    }
}

/// `hash/*` annotations for the fingerprints that are known.
///
/// Subjects without a fingerprint are left out rather than written empty, so
/// a feature that is switched off drops its annotation entirely.
pub(crate) fn hash_annotations(pairs: &[(&str, Option<&String>)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| ((*key).to_string(), v.clone())))
        .collect()
}
