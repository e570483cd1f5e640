// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Redis conversation cache resources.
//!
//! Redis listens on TLS only (`--port 0`) and requires the generated
//! password, which reaches the server through the `REDIS_PASSWORD`
//! environment variable.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, Secret,
    SecretKeySelector, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicyPeer};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

use super::app_server::ingress_policy;
use super::postgres::password_secret;
use super::{config_map_volume, hash_annotations, mount, owned_meta, resources, secret_volume};
use crate::config_file::redis_secret_name;
use crate::constants::{
    APP_CERTS_MOUNT_ROOT, REDIS_CA_VOLUME, REDIS_CERTS_SECRET_NAME, REDIS_DEPLOYMENT_NAME,
    REDIS_MAX_MEMORY, REDIS_MAX_MEMORY_POLICY, REDIS_NETWORK_POLICY_NAME, REDIS_PASSWORD_ENV,
    REDIS_PASSWORD_KEY, REDIS_SECRET_HASH_KEY, REDIS_SERVICE_NAME, REDIS_SERVICE_PORT,
    SERVICE_CA_CERT_FILE_NAME, SERVICE_CA_CONFIGMAP_NAME, SERVING_CERT_SECRET_ANNOTATION_KEY,
    TLS_CERT_FILE, TLS_KEY_FILE,
};
use crate::crd::OLSConfig;
use crate::labels::{app_server_labels, redis_labels};
use crate::options::OperatorOptions;
use crate::state_cache::StateCache;

/// Password secret with a freshly generated password.
#[must_use]
pub fn build_redis_secret(cr: &OLSConfig, options: &OperatorOptions) -> Secret {
    password_secret(
        redis_secret_name(&cr.spec.ols),
        REDIS_PASSWORD_KEY,
        REDIS_SECRET_HASH_KEY,
        redis_labels(),
        cr,
        options,
    )
}

#[must_use]
pub fn build_redis_service(cr: &OLSConfig, options: &OperatorOptions) -> Service {
    let mut metadata = owned_meta(
        REDIS_SERVICE_NAME,
        Some(&options.namespace),
        redis_labels(),
        cr,
    );
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_SECRET_ANNOTATION_KEY.to_string(),
        REDIS_CERTS_SECRET_NAME.to_string(),
    )]));

    Service {
        metadata,
        spec: Some(ServiceSpec {
            selector: Some(redis_labels()),
            ports: Some(vec![ServicePort {
                name: Some("server".to_string()),
                port: REDIS_SERVICE_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::String("server".to_string())),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `redis-server` arguments, TLS only with the password taken from the
/// environment.
fn redis_command(max_memory: &str, max_memory_policy: &str) -> Vec<String> {
    let certs = APP_CERTS_MOUNT_ROOT;
    [
        "redis-server",
        "--port",
        "0",
        "--tls-port",
        &REDIS_SERVICE_PORT.to_string(),
        "--tls-cert-file",
        &format!("{certs}/{TLS_CERT_FILE}"),
        "--tls-key-file",
        &format!("{certs}/{TLS_KEY_FILE}"),
        "--tls-ca-cert-file",
        &format!("{certs}/{REDIS_CA_VOLUME}/{SERVICE_CA_CERT_FILE_NAME}"),
        "--tls-auth-clients",
        "optional",
        "--protected-mode",
        "no",
        "--requirepass",
        &format!("$({REDIS_PASSWORD_ENV})"),
        "--maxmemory",
        max_memory,
        "--maxmemory-policy",
        max_memory_policy,
    ]
    .iter()
    .map(|arg| (*arg).to_string())
    .collect()
}

/// Single-replica redis `Deployment`; `hash/redis-secret` on the pod
/// template restarts the server when the password changes.
#[must_use]
pub fn build_redis_deployment(
    cr: &OLSConfig,
    options: &OperatorOptions,
    cache: &StateCache,
) -> Deployment {
    let spec = &cr.spec.ols.conversation_cache.redis;
    let max_memory = spec.max_memory.as_deref().unwrap_or(REDIS_MAX_MEMORY);
    let max_memory_policy = spec
        .max_memory_policy
        .as_deref()
        .unwrap_or(REDIS_MAX_MEMORY_POLICY);
    let annotations = hash_annotations(&[(REDIS_SECRET_HASH_KEY, cache.cache_secret.as_ref())]);

    let certs_volume = format!("secret-{REDIS_CERTS_SECRET_NAME}");
    let password = EnvVar {
        name: REDIS_PASSWORD_ENV.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: redis_secret_name(&cr.spec.ols).to_string(),
                key: REDIS_PASSWORD_KEY.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut metadata = owned_meta(
        REDIS_DEPLOYMENT_NAME,
        Some(&options.namespace),
        redis_labels(),
        cr,
    );
    metadata.annotations = Some(annotations.clone());

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            revision_history_limit: Some(1),
            selector: LabelSelector {
                match_labels: Some(redis_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(redis_labels()),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: REDIS_DEPLOYMENT_NAME.to_string(),
                        image: Some(options.redis_image.clone()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        ports: Some(vec![ContainerPort {
                            name: Some("server".to_string()),
                            container_port: REDIS_SERVICE_PORT,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        command: Some(redis_command(max_memory, max_memory_policy)),
                        env: Some(vec![password]),
                        volume_mounts: Some(vec![
                            mount(&certs_volume, APP_CERTS_MOUNT_ROOT, true),
                            mount(
                                REDIS_CA_VOLUME,
                                &format!("{APP_CERTS_MOUNT_ROOT}/{REDIS_CA_VOLUME}"),
                                true,
                            ),
                        ]),
                        resources: Some(resources(
                            &[("cpu", "1000m"), ("memory", "1Gi")],
                            &[("cpu", "500m"), ("memory", "512Mi")],
                        )),
                        ..Default::default()
                    }],
                    volumes: Some(vec![
                        secret_volume(&certs_volume, REDIS_CERTS_SECRET_NAME),
                        config_map_volume(REDIS_CA_VOLUME, SERVICE_CA_CONFIGMAP_NAME),
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Only app server pods may reach redis.
#[must_use]
pub fn build_redis_network_policy(cr: &OLSConfig, options: &OperatorOptions) -> NetworkPolicy {
    let app_server = NetworkPolicyPeer {
        pod_selector: Some(LabelSelector {
            match_labels: Some(app_server_labels()),
            ..Default::default()
        }),
        ..Default::default()
    };
    ingress_policy(
        REDIS_NETWORK_POLICY_NAME,
        options,
        redis_labels(),
        vec![app_server],
        REDIS_SERVICE_PORT,
        cr,
    )
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod redis_tests;
