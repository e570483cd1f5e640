// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! App server `Deployment` builder.
//!
//! The pod runs the API container plus two optional sidecars (the user data
//! collector when telemetry allows it, the OpenShift MCP server when
//! introspection is enabled) and one init container per RAG source.
//!
//! Volumes and mounts are emitted in a fixed order so that the same inputs
//! always produce the same pod template:
//!
//! 1. provider credential secrets, in provider declaration order, de-duplicated
//! 2. the cache backend password secret
//! 3. the app server TLS secret
//! 4. the `olsconfig` configmap
//! 5. user data (only while collecting)
//! 6. cluster root CA and the writable certificate bundle directory
//! 7. additional CA, then proxy CA (only when referenced)
//! 8. RAG data (only with RAG sources)
//! 9. cache backend service CA
//! 10. writable `/tmp`
//!
//! Fingerprints from the [`StateCache`] are stamped as `hash/*` annotations
//! on both the deployment and its pod template; a changed template
//! annotation is what rolls the pods.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, HTTPGetAction, PodSpec, PodTemplateSpec, Probe,
    ResourceRequirements, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeSet;

use super::{
    config_map_volume, empty_dir_volume, env_var, hash_annotations, mount, owned_meta,
    proxy_env, resources, resources_or_default, secret_volume,
};
use crate::config_file::{
    app_tls_mount_path, cache_credentials_path, postgres_ca_mount_path, postgres_secret_name,
    provider_credentials_path, redis_ca_mount_path, redis_secret_name,
};
use crate::constants::{
    ADDITIONAL_CA_HASH_KEY, ADDITIONAL_CA_VOLUME_NAME, APP_ADDITIONAL_CA_CERT_DIR,
    APP_CERTS_MOUNT_ROOT, APP_SERVER_CONTAINER_NAME, APP_SERVER_CONTAINER_PORT,
    APP_SERVER_DEPLOYMENT_NAME, APP_SERVER_SERVICE_ACCOUNT_NAME, CERT_BUNDLE_VOLUME_NAME,
    DATA_COLLECTOR_CONTAINER_NAME, KUBE_ROOT_CA_CONFIGMAP_NAME, LLM_PROVIDER_HASH_KEY,
    OLS_APP_TLS_HASH_KEY, OLS_CONFIG_CM_NAME, OLS_CONFIG_FILENAME, OLS_CONFIG_HASH_KEY,
    OLS_CONFIG_MOUNT_PATH, OLS_CONFIG_VOLUME_NAME, OLS_USER_DATA_MOUNT_PATH,
    OLS_USER_DATA_VOLUME_NAME, OPENSHIFT_CA_VOLUME_NAME, OPENSHIFT_MCP_SERVER_CONTAINER_NAME,
    OPENSHIFT_MCP_SERVER_PORT, POSTGRES_CA_VOLUME, POSTGRES_SECRET_HASH_KEY, PROXY_CA_HASH_KEY,
    PROXY_CA_VOLUME_NAME, RAG_VOLUME_MOUNT_PATH, RAG_VOLUME_NAME, REDIS_CA_VOLUME,
    REDIS_SECRET_HASH_KEY, SERVICE_CA_CONFIGMAP_NAME, TMP_VOLUME_MOUNT_PATH, TMP_VOLUME_NAME,
    USER_CA_CERT_DIR,
};
use crate::context::PassInput;
use crate::crd::{CacheType, OlsSpec, RagSpec};
use crate::labels::app_server_labels;
use crate::options::OperatorOptions;
use crate::state_cache::StateCache;

const DATA_COLLECTOR_COMMAND: [&str; 2] = [
    "python3.11",
    "/app-root/ols/user_data_collection/data_collector.py",
];

/// Where a RAG image keeps its index when the custom resource does not say.
const DEFAULT_RAG_INDEX_PATH: &str = "/rag/vector_db";

const PROBE_INITIAL_DELAY_SECS: i32 = 30;
const PROBE_PERIOD_SECS: i32 = 30;
const PROBE_TIMEOUT_SECS: i32 = 30;
const PROBE_FAILURE_THRESHOLD: i32 = 15;

/// Volumes of the pod plus the mounts of the API container, built together
/// so their order always agrees.
#[derive(Default)]
struct PodStorage {
    volumes: Vec<Volume>,
    mounts: Vec<VolumeMount>,
    seen: BTreeSet<String>,
}

impl PodStorage {
    fn add(&mut self, volume: Volume, mount_path: &str, read_only: bool) {
        if self.seen.insert(volume.name.clone()) {
            self.mounts.push(mount(&volume.name, mount_path, read_only));
            self.volumes.push(volume);
        }
    }

    fn add_secret(&mut self, secret_name: &str, mount_path: &str) {
        self.add(
            secret_volume(&format!("secret-{secret_name}"), secret_name),
            mount_path,
            true,
        );
    }
}

fn cache_secret(ols: &OlsSpec) -> &str {
    match ols.conversation_cache.cache_type {
        CacheType::Postgres => postgres_secret_name(ols),
        CacheType::Redis => redis_secret_name(ols),
    }
}

fn pod_storage(input: &PassInput) -> PodStorage {
    let ols = &input.cr.spec.ols;
    let mut storage = PodStorage::default();

    for provider in &input.cr.spec.llm.providers {
        let secret = &provider.credentials_secret_ref.name;
        storage.add_secret(secret, &provider_credentials_path(secret));
    }

    let cache_secret = cache_secret(ols);
    storage.add_secret(cache_secret, &cache_credentials_path(cache_secret));

    storage.add(
        secret_volume(
            &format!("secret-{}", ols.tls_secret_name()),
            ols.tls_secret_name(),
        ),
        &app_tls_mount_path(),
        true,
    );

    storage.add(
        config_map_volume(OLS_CONFIG_VOLUME_NAME, OLS_CONFIG_CM_NAME),
        OLS_CONFIG_MOUNT_PATH,
        true,
    );

    if input.data_collector_enabled() {
        storage.add(
            empty_dir_volume(OLS_USER_DATA_VOLUME_NAME),
            OLS_USER_DATA_MOUNT_PATH,
            false,
        );
    }

    storage.add(
        config_map_volume(OPENSHIFT_CA_VOLUME_NAME, KUBE_ROOT_CA_CONFIGMAP_NAME),
        &format!("{APP_CERTS_MOUNT_ROOT}/{APP_ADDITIONAL_CA_CERT_DIR}"),
        true,
    );
    storage.add(
        empty_dir_volume(CERT_BUNDLE_VOLUME_NAME),
        &format!("{APP_CERTS_MOUNT_ROOT}/{CERT_BUNDLE_VOLUME_NAME}"),
        false,
    );

    if let Some(name) = ols.additional_ca_name() {
        storage.add(
            config_map_volume(ADDITIONAL_CA_VOLUME_NAME, name),
            &format!("{APP_CERTS_MOUNT_ROOT}/{USER_CA_CERT_DIR}"),
            true,
        );
    }
    if let Some(name) = ols.proxy_ca_name() {
        storage.add(
            config_map_volume(PROXY_CA_VOLUME_NAME, name),
            &format!("{APP_CERTS_MOUNT_ROOT}/{PROXY_CA_VOLUME_NAME}"),
            true,
        );
    }

    if !ols.rag.is_empty() {
        storage.add(empty_dir_volume(RAG_VOLUME_NAME), RAG_VOLUME_MOUNT_PATH, true);
    }

    match ols.conversation_cache.cache_type {
        CacheType::Postgres => storage.add(
            config_map_volume(POSTGRES_CA_VOLUME, SERVICE_CA_CONFIGMAP_NAME),
            &postgres_ca_mount_path(),
            true,
        ),
        CacheType::Redis => storage.add(
            config_map_volume(REDIS_CA_VOLUME, SERVICE_CA_CONFIGMAP_NAME),
            &redis_ca_mount_path(),
            true,
        ),
    }

    storage.add(empty_dir_volume(TMP_VOLUME_NAME), TMP_VOLUME_MOUNT_PATH, false);
    storage
}

pub(crate) fn restricted_security_context(read_only_root: bool) -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        read_only_root_filesystem: read_only_root.then_some(true),
        ..Default::default()
    }
}

fn https_probe(path: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::String("https".to_string()),
            scheme: Some("HTTPS".to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(PROBE_INITIAL_DELAY_SECS),
        period_seconds: Some(PROBE_PERIOD_SECS),
        timeout_seconds: Some(PROBE_TIMEOUT_SECS),
        failure_threshold: Some(PROBE_FAILURE_THRESHOLD),
        ..Default::default()
    }
}

fn config_file_env() -> EnvVar {
    env_var(
        "OLS_CONFIG_FILE",
        &format!("{OLS_CONFIG_MOUNT_PATH}/{OLS_CONFIG_FILENAME}"),
    )
}

fn api_container(
    input: &PassInput,
    options: &OperatorOptions,
    mounts: Vec<VolumeMount>,
) -> Container {
    let mut env = proxy_env(options);
    env.push(config_file_env());

    Container {
        name: APP_SERVER_CONTAINER_NAME.to_string(),
        image: Some(options.app_server_image.clone()),
        image_pull_policy: Some("Always".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some("https".to_string()),
            container_port: APP_SERVER_CONTAINER_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(env),
        volume_mounts: Some(mounts),
        resources: Some(resources_or_default(
            input.cr.spec.ols.deployment.api.resources.as_ref(),
            resources(&[("memory", "4Gi")], &[("cpu", "500m"), ("memory", "1Gi")]),
        )),
        security_context: Some(restricted_security_context(true)),
        readiness_probe: Some(https_probe("/readiness")),
        liveness_probe: Some(https_probe("/liveness")),
        ..Default::default()
    }
}

fn sidecar_resources() -> ResourceRequirements {
    resources(&[("memory", "200Mi")], &[("cpu", "50m"), ("memory", "64Mi")])
}

fn data_collector_container(input: &PassInput, options: &OperatorOptions) -> Container {
    Container {
        name: DATA_COLLECTOR_CONTAINER_NAME.to_string(),
        image: Some(options.app_server_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(DATA_COLLECTOR_COMMAND.iter().map(|s| (*s).to_string()).collect()),
        env: Some(vec![config_file_env()]),
        volume_mounts: Some(vec![
            mount(OLS_USER_DATA_VOLUME_NAME, OLS_USER_DATA_MOUNT_PATH, false),
            mount(OLS_CONFIG_VOLUME_NAME, OLS_CONFIG_MOUNT_PATH, true),
        ]),
        resources: Some(resources_or_default(
            input.cr.spec.ols.deployment.data_collector.resources.as_ref(),
            sidecar_resources(),
        )),
        security_context: Some(restricted_security_context(false)),
        ..Default::default()
    }
}

fn mcp_server_container(input: &PassInput, options: &OperatorOptions) -> Container {
    Container {
        name: OPENSHIFT_MCP_SERVER_CONTAINER_NAME.to_string(),
        image: Some(options.openshift_mcp_server_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec![
            "/openshift-mcp-server".to_string(),
            "--read-only".to_string(),
            "--port".to_string(),
            OPENSHIFT_MCP_SERVER_PORT.to_string(),
        ]),
        resources: Some(resources_or_default(
            input.cr.spec.ols.deployment.mcp_server.resources.as_ref(),
            sidecar_resources(),
        )),
        security_context: Some(restricted_security_context(true)),
        ..Default::default()
    }
}

/// One init container per RAG source copying its index into `/rag-data/rag-<i>`.
fn rag_init_containers(rag: &[RagSpec]) -> Vec<Container> {
    rag.iter()
        .enumerate()
        .map(|(i, source)| {
            let name = format!("rag-{i}");
            let target = format!("{RAG_VOLUME_MOUNT_PATH}/{name}");
            let index_path = source
                .index_path
                .as_deref()
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_RAG_INDEX_PATH);
            Container {
                name,
                image: Some(source.image.clone()),
                image_pull_policy: Some("Always".to_string()),
                command: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    format!("mkdir -p {target} && cp -a {index_path}/. {target}"),
                ]),
                volume_mounts: Some(vec![mount(RAG_VOLUME_NAME, RAG_VOLUME_MOUNT_PATH, false)]),
                ..Default::default()
            }
        })
        .collect()
}

/// Template annotation carrying the cache backend password fingerprint.
#[must_use]
pub fn cache_secret_hash_key(cache_type: CacheType) -> &'static str {
    match cache_type {
        CacheType::Postgres => POSTGRES_SECRET_HASH_KEY,
        CacheType::Redis => REDIS_SECRET_HASH_KEY,
    }
}

/// Builds the app server `Deployment`.
///
/// # Arguments
///
/// * `input` - Inputs resolved for this pass
/// * `options` - Operator options (namespace, images, proxy environment)
/// * `cache` - Fingerprints recorded by the earlier pipeline steps
///
/// # Returns
///
/// The desired `Deployment`; replicas default to 1 when unset.
#[must_use]
pub fn build_app_server_deployment(
    input: &PassInput,
    options: &OperatorOptions,
    cache: &StateCache,
) -> Deployment {
    let ols = &input.cr.spec.ols;
    let cache_secret_key = cache_secret_hash_key(ols.conversation_cache.cache_type);
    let annotations = hash_annotations(&[
        (OLS_CONFIG_HASH_KEY, cache.app_config.as_ref()),
        (OLS_APP_TLS_HASH_KEY, cache.app_tls.as_ref()),
        (LLM_PROVIDER_HASH_KEY, cache.llm_provider.as_ref()),
        (cache_secret_key, cache.cache_secret.as_ref()),
        (ADDITIONAL_CA_HASH_KEY, cache.additional_ca.as_ref()),
        (PROXY_CA_HASH_KEY, cache.proxy_ca.as_ref()),
    ]);

    let storage = pod_storage(input);
    let mut containers = vec![api_container(input, options, storage.mounts)];
    if input.data_collector_enabled() {
        containers.push(data_collector_container(input, options));
    }
    if ols.introspection() {
        containers.push(mcp_server_container(input, options));
    }
    let init_containers = rag_init_containers(&ols.rag);
    let api = &ols.deployment.api;

    let mut metadata = owned_meta(
        APP_SERVER_DEPLOYMENT_NAME,
        Some(&options.namespace),
        app_server_labels(),
        &input.cr,
    );
    metadata.annotations = Some(annotations.clone());

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(ols.deployment.replicas.unwrap_or(1)),
            revision_history_limit: Some(1),
            selector: LabelSelector {
                match_labels: Some(app_server_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_server_labels()),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(APP_SERVER_SERVICE_ACCOUNT_NAME.to_string()),
                    containers,
                    init_containers: (!init_containers.is_empty()).then_some(init_containers),
                    volumes: Some(storage.volumes),
                    node_selector: (!api.node_selector.is_empty())
                        .then(|| api.node_selector.clone()),
                    tolerations: (!api.tolerations.is_empty()).then(|| api.tolerations.clone()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "app_server_deployment_tests.rs"]
mod app_server_deployment_tests;
