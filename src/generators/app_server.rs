// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! App server supporting resources.
//!
//! Everything the app server `Deployment` depends on except the cache
//! backend: the service account and its access-review RBAC, the rendered
//! `olsconfig` `ConfigMap`, the HTTPS `Service`, the metrics scrape objects
//! and the ingress `NetworkPolicy`. The deployment itself lives in
//! [`app_server_deployment`](super::app_server_deployment).

use k8s_openapi::api::core::v1::{
    ConfigMap, Secret, Service, ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::debug;

use super::owned_meta;
use crate::config_file::{render_app_config, ReferencedCertificates};
use crate::constants::{
    APP_SERVER_CONTAINER_PORT, APP_SERVER_METRICS_PATH, APP_SERVER_NETWORK_POLICY_NAME,
    APP_SERVER_PROMETHEUS_RULE_NAME, APP_SERVER_SAR_ROLE_BINDING_NAME, APP_SERVER_SAR_ROLE_NAME,
    APP_SERVER_SERVICE_ACCOUNT_NAME, APP_SERVER_SERVICE_MONITOR_NAME, APP_SERVER_SERVICE_NAME,
    METRICS_READER_SECRET_NAME, METRICS_READER_SERVICE_ACCOUNT_NAME, OLS_CERTS_SECRET_NAME,
    OLS_CONFIG_CM_NAME, OLS_CONFIG_FILENAME, OLS_CONFIG_HASH_KEY,
    SERVING_CERT_SECRET_ANNOTATION_KEY, TELEMETRY_PULL_SECRET_NAME, TLS_CERT_FILE, TLS_KEY_FILE,
};
use crate::context::PassInput;
use crate::crd::OLSConfig;
use crate::errors::Result;
use crate::external_types::{
    MonitorEndpoint, MonitorTlsConfig, PrometheusRule, PrometheusRuleSpec, Rule, RuleGroup,
    SecretKeyRef, ServiceMonitor, ServiceMonitorSpec,
};
use crate::fingerprint::fingerprint;
use crate::labels::{
    app_server_labels, COMPONENT_METRICS, K8S_COMPONENT, K8S_NAME, K8S_PART_OF,
    MANAGED_BY_OPERATOR, MONITORING_COLLECTION_PROFILE, MONITORING_COLLECTION_PROFILE_FULL,
    USER_MONITORING,
};
use crate::options::OperatorOptions;

// Scrape client material mounted into the cluster Prometheus
pub(crate) const PROMETHEUS_CA_FILE: &str =
    "/etc/prometheus/configmaps/serving-certs-ca-bundle/service-ca.crt";
pub(crate) const PROMETHEUS_CLIENT_CERT_DIR: &str = "/etc/prometheus/secrets/metrics-client-certs";
pub(crate) const SCRAPE_INTERVAL: &str = "30s";

const MONITORING_NAMESPACE: &str = "openshift-monitoring";
const CONSOLE_NAMESPACE: &str = "openshift-console";
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";
const INGRESS_POLICY_GROUP_LABEL: &str = "network.openshift.io/policy-group";

const RULE_GROUP_NAME: &str = "ols.operations.rules";

/// Service account the app server pods run as.
#[must_use]
pub fn build_service_account(cr: &OLSConfig, options: &OperatorOptions) -> ServiceAccount {
    ServiceAccount {
        metadata: owned_meta(
            APP_SERVER_SERVICE_ACCOUNT_NAME,
            Some(&options.namespace),
            app_server_labels(),
            cr,
        ),
        ..Default::default()
    }
}

fn policy_rule(api_group: &str, resource: &str, verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(vec![resource.to_string()]),
        verbs: verbs.iter().map(|v| (*v).to_string()).collect(),
        ..Default::default()
    }
}

/// Cluster role letting the app server authenticate and authorize callers.
///
/// The app server validates bearer tokens with `TokenReview`, checks access
/// with `SubjectAccessReview`, reads the cluster version for product docs and
/// reads the pull secret to detect telemetry.
#[must_use]
pub fn build_sar_cluster_role(cr: &OLSConfig) -> ClusterRole {
    let mut pull_secret = policy_rule("", "secrets", &["get"]);
    pull_secret.resource_names = Some(vec![TELEMETRY_PULL_SECRET_NAME.to_string()]);

    ClusterRole {
        metadata: owned_meta(APP_SERVER_SAR_ROLE_NAME, None, app_server_labels(), cr),
        rules: Some(vec![
            policy_rule("authorization.k8s.io", "subjectaccessreviews", &["create"]),
            policy_rule("authentication.k8s.io", "tokenreviews", &["create"]),
            policy_rule("config.openshift.io", "clusterversions", &["get", "list"]),
            pull_secret,
        ]),
        ..Default::default()
    }
}

/// Binds [`build_sar_cluster_role`] to the app server service account.
#[must_use]
pub fn build_sar_cluster_role_binding(
    cr: &OLSConfig,
    options: &OperatorOptions,
) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: owned_meta(APP_SERVER_SAR_ROLE_BINDING_NAME, None, app_server_labels(), cr),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: APP_SERVER_SAR_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: APP_SERVER_SERVICE_ACCOUNT_NAME.to_string(),
            namespace: Some(options.namespace.clone()),
            ..Default::default()
        }]),
    }
}

/// Builds the `olsconfig` `ConfigMap` holding the rendered configuration file.
///
/// The fingerprint of the rendered document is stored in the
/// `hash/olsconfig` annotation; the reconciler compares it with the
/// fingerprint of the live document to decide whether to write.
///
/// # Arguments
///
/// * `input` - Inputs resolved for this pass
/// * `options` - Operator options (namespace)
/// * `certificates` - Content of the CA configmaps referenced by the custom resource
///
/// # Errors
///
/// Returns any error from rendering the document, most notably
/// [`OperatorError::CertificateValidation`](crate::errors::OperatorError::CertificateValidation)
/// for a malformed CA entry. No object is produced in that case.
pub fn build_ols_config_map(
    input: &PassInput,
    options: &OperatorOptions,
    certificates: &ReferencedCertificates,
) -> Result<ConfigMap> {
    let document = render_app_config(input, &options.namespace, certificates)?;
    let hash = fingerprint(document.as_bytes());
    debug!(hash = %hash, "Rendered OLS configuration document");

    let mut metadata = owned_meta(
        OLS_CONFIG_CM_NAME,
        Some(&options.namespace),
        app_server_labels(),
        &input.cr,
    );
    metadata.annotations = Some(BTreeMap::from([(OLS_CONFIG_HASH_KEY.to_string(), hash)]));

    Ok(ConfigMap {
        metadata,
        data: Some(BTreeMap::from([(OLS_CONFIG_FILENAME.to_string(), document)])),
        ..Default::default()
    })
}

/// HTTPS service in front of the app server pods.
///
/// Without a user TLS secret the service asks the service CA to issue
/// `lightspeed-tls`; with one, the annotation is omitted so the service CA
/// never overwrites the user's material.
#[must_use]
pub fn build_service(cr: &OLSConfig, options: &OperatorOptions) -> Service {
    let mut metadata = owned_meta(
        APP_SERVER_SERVICE_NAME,
        Some(&options.namespace),
        app_server_labels(),
        cr,
    );
    if !cr.spec.ols.has_user_tls() {
        metadata.annotations = Some(BTreeMap::from([(
            SERVING_CERT_SECRET_ANNOTATION_KEY.to_string(),
            OLS_CERTS_SECRET_NAME.to_string(),
        )]));
    }

    Service {
        metadata,
        spec: Some(ServiceSpec {
            selector: Some(app_server_labels()),
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: APP_SERVER_CONTAINER_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::String("https".to_string())),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Long-lived token for the metrics reader service account, used by
/// Prometheus as the scrape bearer token.
#[must_use]
pub fn build_metrics_reader_secret(cr: &OLSConfig, options: &OperatorOptions) -> Secret {
    let labels = BTreeMap::from([
        (K8S_NAME.to_string(), "service-account-token".to_string()),
        (K8S_COMPONENT.to_string(), COMPONENT_METRICS.to_string()),
        (K8S_PART_OF.to_string(), MANAGED_BY_OPERATOR.to_string()),
    ]);
    let mut metadata = owned_meta(
        METRICS_READER_SECRET_NAME,
        Some(&options.namespace),
        labels,
        cr,
    );
    metadata.annotations = Some(BTreeMap::from([(
        "kubernetes.io/service-account.name".to_string(),
        METRICS_READER_SERVICE_ACCOUNT_NAME.to_string(),
    )]));

    Secret {
        metadata,
        type_: Some("kubernetes.io/service-account-token".to_string()),
        ..Default::default()
    }
}

/// Scrape configuration for the app server `/metrics` endpoint.
#[must_use]
pub fn build_service_monitor(cr: &OLSConfig, options: &OperatorOptions) -> ServiceMonitor {
    let mut labels = app_server_labels();
    labels.insert(
        MONITORING_COLLECTION_PROFILE.to_string(),
        MONITORING_COLLECTION_PROFILE_FULL.to_string(),
    );
    labels.insert(K8S_COMPONENT.to_string(), COMPONENT_METRICS.to_string());
    labels.insert(USER_MONITORING.to_string(), "false".to_string());

    ServiceMonitor {
        metadata: owned_meta(
            APP_SERVER_SERVICE_MONITOR_NAME,
            Some(&options.namespace),
            labels,
            cr,
        ),
        spec: ServiceMonitorSpec {
            endpoints: vec![MonitorEndpoint {
                port: Some("https".to_string()),
                path: Some(APP_SERVER_METRICS_PATH.to_string()),
                interval: Some(SCRAPE_INTERVAL.to_string()),
                scheme: Some("https".to_string()),
                bearer_token_secret: Some(SecretKeyRef {
                    name: METRICS_READER_SECRET_NAME.to_string(),
                    key: "token".to_string(),
                }),
                tls_config: Some(MonitorTlsConfig {
                    ca_file: Some(PROMETHEUS_CA_FILE.to_string()),
                    cert_file: Some(format!("{PROMETHEUS_CLIENT_CERT_DIR}/{TLS_CERT_FILE}")),
                    key_file: Some(format!("{PROMETHEUS_CLIENT_CERT_DIR}/{TLS_KEY_FILE}")),
                    server_name: Some(format!(
                        "{APP_SERVER_SERVICE_NAME}.{}.svc",
                        options.namespace
                    )),
                    insecure_skip_verify: Some(false),
                }),
            }],
            job_label: Some(K8S_NAME.to_string()),
            namespace_selector: None,
            selector: LabelSelector {
                match_labels: Some(app_server_labels()),
                ..Default::default()
            },
        },
    }
}

fn status_code_rule(class: &str) -> Rule {
    Rule {
        record: Some(format!("ols:rest_api_query_calls_total:{class}")),
        alert: None,
        expr: format!(
            "sum by(status_code) (ols_rest_api_calls_total{{path=\"/v1/streaming_query\",status_code=~\"{}..\"}})",
            &class[..1]
        ),
        labels: BTreeMap::from([("status_code".to_string(), class.to_string())]),
    }
}

/// Recording rules aggregating the app server's query metrics.
#[must_use]
pub fn build_prometheus_rule(cr: &OLSConfig, options: &OperatorOptions) -> PrometheusRule {
    PrometheusRule {
        metadata: owned_meta(
            APP_SERVER_PROMETHEUS_RULE_NAME,
            Some(&options.namespace),
            app_server_labels(),
            cr,
        ),
        spec: PrometheusRuleSpec {
            groups: vec![RuleGroup {
                name: RULE_GROUP_NAME.to_string(),
                rules: vec![
                    status_code_rule("2xx"),
                    status_code_rule("4xx"),
                    status_code_rule("5xx"),
                    Rule {
                        record: Some("ols:provider_model_configuration".to_string()),
                        alert: None,
                        expr: "max by (provider,model) (ols_provider_model_configuration)"
                            .to_string(),
                        labels: BTreeMap::new(),
                    },
                ],
            }],
        },
    }
}

fn namespace_selector(namespace: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from([(
            NAMESPACE_NAME_LABEL.to_string(),
            namespace.to_string(),
        )])),
        ..Default::default()
    }
}

fn label_selector(key: &str, value: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
        ..Default::default()
    }
}

/// Single-port TCP ingress policy shared by every component.
pub(crate) fn ingress_policy(
    name: &str,
    options: &OperatorOptions,
    pod_labels: BTreeMap<String, String>,
    from: Vec<NetworkPolicyPeer>,
    port: i32,
    cr: &OLSConfig,
) -> NetworkPolicy {
    NetworkPolicy {
        metadata: owned_meta(name, Some(&options.namespace), pod_labels.clone(), cr),
        spec: Some(NetworkPolicySpec {
            pod_selector: Some(LabelSelector {
                match_labels: Some(pod_labels),
                ..Default::default()
            }),
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(from),
                ports: Some(vec![NetworkPolicyPort {
                    port: Some(IntOrString::Int(port)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
            }]),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Console pods in `openshift-console`, the only browser-facing caller.
pub(crate) fn console_peer() -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        namespace_selector: Some(namespace_selector(CONSOLE_NAMESPACE)),
        pod_selector: Some(label_selector("app", "console")),
        ..Default::default()
    }
}

/// The cluster Prometheus pods in `openshift-monitoring`.
pub(crate) fn prometheus_peer() -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        namespace_selector: Some(namespace_selector(MONITORING_NAMESPACE)),
        pod_selector: Some(LabelSelector {
            match_expressions: Some(vec![
                LabelSelectorRequirement {
                    key: K8S_NAME.to_string(),
                    operator: "In".to_string(),
                    values: Some(vec!["prometheus".to_string()]),
                },
                LabelSelectorRequirement {
                    key: "prometheus".to_string(),
                    operator: "In".to_string(),
                    values: Some(vec!["k8s".to_string()]),
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ingress to the app server from Prometheus, the console and the router.
#[must_use]
pub fn build_network_policy(cr: &OLSConfig, options: &OperatorOptions) -> NetworkPolicy {
    let ingress = NetworkPolicyPeer {
        namespace_selector: Some(label_selector(INGRESS_POLICY_GROUP_LABEL, "ingress")),
        ..Default::default()
    };

    ingress_policy(
        APP_SERVER_NETWORK_POLICY_NAME,
        options,
        app_server_labels(),
        vec![prometheus_peer(), console_peer(), ingress],
        APP_SERVER_CONTAINER_PORT,
        cr,
    )
}

#[cfg(test)]
#[path = "app_server_tests.rs"]
mod app_server_tests;
