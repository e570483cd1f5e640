// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Console UI plugin resources.
//!
//! The plugin is a static bundle served by nginx over TLS. The console
//! reaches the app server through the `ols` proxy alias declared on the
//! `ConsolePlugin`, forwarding the user's token.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerPort, PodSecurityContext, PodSpec, PodTemplateSpec,
    SeccompProfile, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

use super::app_server::{console_peer, ingress_policy};
use super::app_server_deployment::restricted_security_context;
use super::{
    config_map_volume, empty_dir_volume, env_var, hash_annotations, mount, owned_meta, proxy_env,
    resources, resources_or_default, secret_volume, sub_path_mount,
};
use crate::constants::{
    APP_SERVER_CONTAINER_PORT, APP_SERVER_SERVICE_NAME, CONSOLE_NGINX_CONFIG,
    CONSOLE_UI_CONFIGMAP_NAME, CONSOLE_UI_CONTAINER_NAME, CONSOLE_UI_DEPLOYMENT_NAME,
    CONSOLE_UI_DISPLAY_NAME, CONSOLE_UI_HTTPS_PORT, CONSOLE_UI_NETWORK_POLICY_NAME,
    CONSOLE_UI_PLUGIN_NAME, CONSOLE_UI_PROXY_ALIAS, CONSOLE_UI_SERVICE_CERT_SECRET_NAME,
    CONSOLE_UI_SERVICE_NAME, OLS_CONSOLE_TLS_HASH_KEY, SERVING_CERT_SECRET_ANNOTATION_KEY,
};
use crate::crd::OLSConfig;
use crate::external_types::{
    ConsolePlugin, ConsolePluginBackend, ConsolePluginI18n, ConsolePluginProxy,
    ConsolePluginService, ConsolePluginSpec,
};
use crate::labels::console_labels;
use crate::options::OperatorOptions;
use crate::state_cache::StateCache;

const NGINX_CONFIG_KEY: &str = "nginx.conf";
const NGINX_CONFIG_VOLUME: &str = "nginx-config";
const NGINX_TEMP_VOLUME: &str = "nginx-temp";
const CERT_VOLUME: &str = "lightspeed-console-plugin-cert";
const CERT_MOUNT_PATH: &str = "/var/cert";

/// nginx configuration serving the plugin bundle on 9443.
#[must_use]
pub fn build_console_config_map(cr: &OLSConfig, options: &OperatorOptions) -> ConfigMap {
    ConfigMap {
        metadata: owned_meta(
            CONSOLE_UI_CONFIGMAP_NAME,
            Some(&options.namespace),
            console_labels(),
            cr,
        ),
        data: Some(BTreeMap::from([(
            NGINX_CONFIG_KEY.to_string(),
            CONSOLE_NGINX_CONFIG.to_string(),
        )])),
        ..Default::default()
    }
}

#[must_use]
pub fn build_console_service(cr: &OLSConfig, options: &OperatorOptions) -> Service {
    let mut metadata = owned_meta(
        CONSOLE_UI_SERVICE_NAME,
        Some(&options.namespace),
        console_labels(),
        cr,
    );
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_SECRET_ANNOTATION_KEY.to_string(),
        CONSOLE_UI_SERVICE_CERT_SECRET_NAME.to_string(),
    )]));

    Service {
        metadata,
        spec: Some(ServiceSpec {
            selector: Some(console_labels()),
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: CONSOLE_UI_HTTPS_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::String("https".to_string())),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// nginx `Deployment` serving the plugin.
///
/// `hash/olsconsoletls` follows the serving certificate so that a rotated
/// key pair restarts nginx.
#[must_use]
pub fn build_console_deployment(
    cr: &OLSConfig,
    options: &OperatorOptions,
    cache: &StateCache,
) -> Deployment {
    let console = &cr.spec.ols.deployment.console;
    let annotations = hash_annotations(&[(OLS_CONSOLE_TLS_HASH_KEY, cache.console_tls.as_ref())]);

    let mut env = proxy_env(options);
    env.push(env_var(
        "HIDE_ICON",
        &cr.spec.ols.hide_icon.unwrap_or(false).to_string(),
    ));

    let mut metadata = owned_meta(
        CONSOLE_UI_DEPLOYMENT_NAME,
        Some(&options.namespace),
        console_labels(),
        cr,
    );
    metadata.annotations = Some(annotations.clone());

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(console.replicas.unwrap_or(1)),
            revision_history_limit: Some(1),
            selector: LabelSelector {
                match_labels: Some(console_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(console_labels()),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONSOLE_UI_CONTAINER_NAME.to_string(),
                        image: Some(options.console_image.clone()),
                        image_pull_policy: Some("Always".to_string()),
                        ports: Some(vec![ContainerPort {
                            name: Some("https".to_string()),
                            container_port: CONSOLE_UI_HTTPS_PORT,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        security_context: Some(restricted_security_context(true)),
                        env: Some(env),
                        resources: Some(resources_or_default(
                            console.resources.as_ref(),
                            resources(&[("memory", "100Mi")], &[("cpu", "10m"), ("memory", "50Mi")]),
                        )),
                        volume_mounts: Some(vec![
                            mount(CERT_VOLUME, CERT_MOUNT_PATH, true),
                            sub_path_mount(
                                NGINX_CONFIG_VOLUME,
                                "/etc/nginx/nginx.conf",
                                NGINX_CONFIG_KEY,
                            ),
                            mount(NGINX_TEMP_VOLUME, "/tmp/nginx", false),
                        ]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![
                        secret_volume(CERT_VOLUME, CONSOLE_UI_SERVICE_CERT_SECRET_NAME),
                        config_map_volume(NGINX_CONFIG_VOLUME, CONSOLE_UI_CONFIGMAP_NAME),
                        empty_dir_volume(NGINX_TEMP_VOLUME),
                    ]),
                    security_context: Some(PodSecurityContext {
                        run_as_non_root: Some(true),
                        seccomp_profile: Some(SeccompProfile {
                            type_: "RuntimeDefault".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    node_selector: (!console.node_selector.is_empty())
                        .then(|| console.node_selector.clone()),
                    tolerations: (!console.tolerations.is_empty())
                        .then(|| console.tolerations.clone()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn service_backend(
    name: &str,
    namespace: &str,
    port: i32,
    base_path: Option<&str>,
) -> ConsolePluginBackend {
    ConsolePluginBackend {
        backend_type: "Service".to_string(),
        service: Some(ConsolePluginService {
            name: name.to_string(),
            namespace: namespace.to_string(),
            port,
            base_path: base_path.map(str::to_string),
        }),
    }
}

/// Cluster-scoped plugin registration with the `ols` proxy to the app server.
#[must_use]
pub fn build_console_plugin(cr: &OLSConfig, options: &OperatorOptions) -> ConsolePlugin {
    let mut plugin = ConsolePlugin::new(
        CONSOLE_UI_PLUGIN_NAME,
        ConsolePluginSpec {
            display_name: CONSOLE_UI_DISPLAY_NAME.to_string(),
            backend: service_backend(
                CONSOLE_UI_SERVICE_NAME,
                &options.namespace,
                CONSOLE_UI_HTTPS_PORT,
                Some("/"),
            ),
            i18n: Some(ConsolePluginI18n {
                load_type: "Preload".to_string(),
            }),
            proxy: vec![ConsolePluginProxy {
                alias: CONSOLE_UI_PROXY_ALIAS.to_string(),
                authorization: Some("UserToken".to_string()),
                endpoint: service_backend(
                    APP_SERVER_SERVICE_NAME,
                    &options.namespace,
                    APP_SERVER_CONTAINER_PORT,
                    None,
                ),
                ca_certificate: cr.spec.ols.deployment.console.ca_certificate.clone(),
            }],
        },
    );
    plugin.metadata = owned_meta(CONSOLE_UI_PLUGIN_NAME, None, console_labels(), cr);
    plugin
}

/// Only console pods may reach the plugin.
#[must_use]
pub fn build_console_network_policy(cr: &OLSConfig, options: &OperatorOptions) -> NetworkPolicy {
    ingress_policy(
        CONSOLE_UI_NETWORK_POLICY_NAME,
        options,
        console_labels(),
        vec![console_peer()],
        CONSOLE_UI_HTTPS_PORT,
        cr,
    )
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod console_tests;
