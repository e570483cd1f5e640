// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Postgres conversation cache resources.
//!
//! Postgres serves TLS with a certificate the service CA issues into
//! `lightspeed-postgres-certs` and trusts clients through the
//! `openshift-service-ca.crt` bundle. The password lives in a generated
//! secret that both the postgres pod (through `secretKeyRef`) and the app
//! server (mounted as a file) read.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerPort, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, Secret,
    SecretKeySelector, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicyPeer};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

use super::app_server::ingress_policy;
use super::{
    config_map_volume, empty_dir_volume, env_var, hash_annotations, mount, owned_meta,
    resources, secret_volume, sub_path_mount,
};
use crate::config_file::postgres_secret_name;
use crate::constants::{
    APP_CERTS_MOUNT_ROOT, GENERATED_PASSWORD_BYTES, POSTGRES_BOOTSTRAP_MOUNT_PATH,
    POSTGRES_BOOTSTRAP_SCRIPT, POSTGRES_BOOTSTRAP_SECRET_NAME, POSTGRES_CA_VOLUME,
    POSTGRES_CERTS_SECRET_NAME, POSTGRES_CONFIG_CONTENT, POSTGRES_CONFIG_HASH_KEY,
    POSTGRES_CONFIG_KEY, POSTGRES_CONFIG_MAP_NAME, POSTGRES_CONFIG_MOUNT_PATH,
    POSTGRES_DATA_MOUNT_PATH, POSTGRES_DATA_VOLUME, POSTGRES_DEFAULT_DB_NAME,
    POSTGRES_DEFAULT_USER, POSTGRES_DEPLOYMENT_NAME, POSTGRES_EXTENSION_SCRIPT,
    POSTGRES_MAX_CONNECTIONS, POSTGRES_NETWORK_POLICY_NAME, POSTGRES_PASSWORD_KEY,
    POSTGRES_SECRET_HASH_KEY, POSTGRES_SERVICE_NAME, POSTGRES_SERVICE_PORT,
    POSTGRES_SHARED_BUFFERS, POSTGRES_VAR_RUN_MOUNT_PATH, POSTGRES_VAR_RUN_VOLUME,
    SERVICE_CA_CONFIGMAP_NAME, SERVING_CERT_SECRET_ANNOTATION_KEY, TMP_VOLUME_MOUNT_PATH,
    TMP_VOLUME_NAME,
};
use crate::crd::OLSConfig;
use crate::fingerprint::fingerprint;
use crate::labels::{app_server_labels, postgres_labels};
use crate::options::OperatorOptions;
use crate::state_cache::StateCache;

/// Postgres refuses a private key readable by others (0600).
const TLS_KEY_MODE: i32 = 0o600;

/// Random cache backend password, base64 encoded.
pub(crate) fn generate_password() -> String {
    let bytes: [u8; GENERATED_PASSWORD_BYTES] = rand::random();
    BASE64.encode(bytes)
}

/// `postgresql.conf.sample` enabling TLS with the service CA material.
#[must_use]
pub fn build_postgres_config_map(cr: &OLSConfig, options: &OperatorOptions) -> ConfigMap {
    let mut metadata = owned_meta(
        POSTGRES_CONFIG_MAP_NAME,
        Some(&options.namespace),
        postgres_labels(),
        cr,
    );
    metadata.annotations = Some(BTreeMap::from([(
        POSTGRES_CONFIG_HASH_KEY.to_string(),
        fingerprint(POSTGRES_CONFIG_CONTENT.as_bytes()),
    )]));

    ConfigMap {
        metadata,
        data: Some(BTreeMap::from([(
            POSTGRES_CONFIG_KEY.to_string(),
            POSTGRES_CONFIG_CONTENT.to_string(),
        )])),
        ..Default::default()
    }
}

/// Init script creating the extensions and schema the app server expects.
#[must_use]
pub fn build_bootstrap_secret(cr: &OLSConfig, options: &OperatorOptions) -> Secret {
    Secret {
        metadata: owned_meta(
            POSTGRES_BOOTSTRAP_SECRET_NAME,
            Some(&options.namespace),
            postgres_labels(),
            cr,
        ),
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            POSTGRES_EXTENSION_SCRIPT.to_string(),
            ByteString(POSTGRES_BOOTSTRAP_SCRIPT.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// Password secret with a freshly generated password.
///
/// Only used when the secret does not exist yet; an existing password is
/// never replaced. The `hash/postgres-secret` annotation carries the
/// fingerprint of the password bytes.
#[must_use]
pub fn build_postgres_secret(cr: &OLSConfig, options: &OperatorOptions) -> Secret {
    password_secret(
        postgres_secret_name(&cr.spec.ols),
        POSTGRES_PASSWORD_KEY,
        POSTGRES_SECRET_HASH_KEY,
        postgres_labels(),
        cr,
        options,
    )
}

pub(crate) fn password_secret(
    name: &str,
    key: &str,
    hash_key: &str,
    labels: BTreeMap<String, String>,
    cr: &OLSConfig,
    options: &OperatorOptions,
) -> Secret {
    let password = generate_password();
    let mut metadata = owned_meta(name, Some(&options.namespace), labels, cr);
    metadata.annotations = Some(BTreeMap::from([(
        hash_key.to_string(),
        fingerprint(password.as_bytes()),
    )]));

    Secret {
        metadata,
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            key.to_string(),
            ByteString(password.into_bytes()),
        )])),
        ..Default::default()
    }
}

/// Cluster IP service; the serving-cert annotation makes the service CA
/// issue `lightspeed-postgres-certs`.
#[must_use]
pub fn build_postgres_service(cr: &OLSConfig, options: &OperatorOptions) -> Service {
    let mut metadata = owned_meta(
        POSTGRES_SERVICE_NAME,
        Some(&options.namespace),
        postgres_labels(),
        cr,
    );
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_SECRET_ANNOTATION_KEY.to_string(),
        POSTGRES_CERTS_SECRET_NAME.to_string(),
    )]));

    Service {
        metadata,
        spec: Some(ServiceSpec {
            selector: Some(postgres_labels()),
            ports: Some(vec![ServicePort {
                name: Some("server".to_string()),
                port: POSTGRES_SERVICE_PORT,
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

fn password_env(name: &str, secret_name: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret_name.to_string(),
                key: POSTGRES_PASSWORD_KEY.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Single-replica postgres `Deployment`.
///
/// The pod template carries `hash/olspostgresconfig` and
/// `hash/postgres-secret` so that a changed configuration or password
/// restarts the server.
#[must_use]
pub fn build_postgres_deployment(
    cr: &OLSConfig,
    options: &OperatorOptions,
    cache: &StateCache,
) -> Deployment {
    let spec = &cr.spec.ols.conversation_cache.postgres;
    let secret_name = postgres_secret_name(&cr.spec.ols);
    let annotations = hash_annotations(&[
        (POSTGRES_CONFIG_HASH_KEY, cache.postgres_config.as_ref()),
        (POSTGRES_SECRET_HASH_KEY, cache.cache_secret.as_ref()),
    ]);

    let certs_volume = format!("secret-{POSTGRES_CERTS_SECRET_NAME}");
    let bootstrap_volume = format!("secret-{POSTGRES_BOOTSTRAP_SECRET_NAME}");
    let mut tls = secret_volume(&certs_volume, POSTGRES_CERTS_SECRET_NAME);
    if let Some(source) = tls.secret.as_mut() {
        source.default_mode = Some(TLS_KEY_MODE);
    }
    let volumes = vec![
        tls,
        secret_volume(&bootstrap_volume, POSTGRES_BOOTSTRAP_SECRET_NAME),
        config_map_volume(POSTGRES_CONFIG_MAP_NAME, POSTGRES_CONFIG_MAP_NAME),
        empty_dir_volume(POSTGRES_DATA_VOLUME),
        config_map_volume(POSTGRES_CA_VOLUME, SERVICE_CA_CONFIGMAP_NAME),
        empty_dir_volume(POSTGRES_VAR_RUN_VOLUME),
        empty_dir_volume(TMP_VOLUME_NAME),
    ];
    let mounts = vec![
        mount(&certs_volume, APP_CERTS_MOUNT_ROOT, true),
        sub_path_mount(&bootstrap_volume, POSTGRES_BOOTSTRAP_MOUNT_PATH, POSTGRES_EXTENSION_SCRIPT),
        sub_path_mount(POSTGRES_CONFIG_MAP_NAME, POSTGRES_CONFIG_MOUNT_PATH, POSTGRES_CONFIG_KEY),
        mount(POSTGRES_DATA_VOLUME, POSTGRES_DATA_MOUNT_PATH, false),
        mount(
            POSTGRES_CA_VOLUME,
            &format!("{APP_CERTS_MOUNT_ROOT}/{POSTGRES_CA_VOLUME}"),
            true,
        ),
        mount(POSTGRES_VAR_RUN_VOLUME, POSTGRES_VAR_RUN_MOUNT_PATH, false),
        mount(TMP_VOLUME_NAME, TMP_VOLUME_MOUNT_PATH, false),
    ];

    let env = vec![
        env_var(
            "POSTGRESQL_USER",
            spec.user.as_deref().unwrap_or(POSTGRES_DEFAULT_USER),
        ),
        env_var(
            "POSTGRESQL_DATABASE",
            spec.db_name.as_deref().unwrap_or(POSTGRES_DEFAULT_DB_NAME),
        ),
        password_env("POSTGRESQL_ADMIN_PASSWORD", secret_name),
        password_env("POSTGRESQL_PASSWORD", secret_name),
        env_var(
            "POSTGRESQL_SHARED_BUFFERS",
            spec.shared_buffers
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(POSTGRES_SHARED_BUFFERS),
        ),
        env_var(
            "POSTGRESQL_MAX_CONNECTIONS",
            &spec
                .max_connections
                .unwrap_or(POSTGRES_MAX_CONNECTIONS)
                .to_string(),
        ),
    ];

    let mut metadata = owned_meta(
        POSTGRES_DEPLOYMENT_NAME,
        Some(&options.namespace),
        postgres_labels(),
        cr,
    );
    metadata.annotations = Some(annotations.clone());

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            revision_history_limit: Some(1),
            selector: LabelSelector {
                match_labels: Some(postgres_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(postgres_labels()),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: POSTGRES_DEPLOYMENT_NAME.to_string(),
                        image: Some(options.postgres_image.clone()),
                        image_pull_policy: Some("Always".to_string()),
                        ports: Some(vec![ContainerPort {
                            name: Some("server".to_string()),
                            container_port: POSTGRES_SERVICE_PORT,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        env: Some(env),
                        volume_mounts: Some(mounts),
                        resources: Some(resources(
                            &[("memory", "2Gi")],
                            &[("cpu", "30m"), ("memory", "300Mi")],
                        )),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Only app server pods may reach postgres.
#[must_use]
pub fn build_postgres_network_policy(cr: &OLSConfig, options: &OperatorOptions) -> NetworkPolicy {
    let app_server = NetworkPolicyPeer {
        pod_selector: Some(LabelSelector {
            match_labels: Some(app_server_labels()),
            ..Default::default()
        }),
        ..Default::default()
    };
    ingress_policy(
        POSTGRES_NETWORK_POLICY_NAME,
        options,
        postgres_labels(),
        vec![app_server],
        POSTGRES_SERVICE_PORT,
        cr,
    )
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod postgres_tests;
