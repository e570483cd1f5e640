// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The operator's own scrape target and ingress policy.
//!
//! These exist whether or not an `OLSConfig` does, so nothing here is owned by
//! the custom resource. The service monitor is owned by the operator
//! `Deployment` when it can be found; the network policy is never owned.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPort, NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

use super::app_server::{
    prometheus_peer, PROMETHEUS_CA_FILE, PROMETHEUS_CLIENT_CERT_DIR, SCRAPE_INTERVAL,
};
use crate::constants::{
    APP_SERVER_METRICS_PATH, OPERATOR_METRICS_PORT, OPERATOR_NETWORK_POLICY_NAME,
    OPERATOR_SERVICE_MONITOR_NAME, OPERATOR_SERVICE_NAME, TLS_CERT_FILE, TLS_KEY_FILE,
};
use crate::external_types::{MonitorEndpoint, MonitorTlsConfig, ServiceMonitor, ServiceMonitorSpec};
use crate::labels::{
    operator_selector_labels, COMPONENT_METRICS, CONTROL_PLANE, CONTROL_PLANE_CONTROLLER_MANAGER,
    K8S_COMPONENT, K8S_INSTANCE, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF, MANAGED_BY_OPERATOR,
    MONITORING_COLLECTION_PROFILE, MONITORING_COLLECTION_PROFILE_FULL, USER_MONITORING,
};
use crate::options::OperatorOptions;

fn operator_labels(component: &str, name: &str, instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_COMPONENT.to_string(), component.to_string()),
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_OPERATOR.to_string()),
        (K8S_NAME.to_string(), name.to_string()),
        (K8S_INSTANCE.to_string(), instance.to_string()),
        (K8S_PART_OF.to_string(), MANAGED_BY_OPERATOR.to_string()),
    ])
}

/// Non-controller owner reference to the operator `Deployment`.
fn deployment_owner(deployment: &Deployment) -> Option<Vec<OwnerReference>> {
    let uid = deployment.metadata.uid.clone()?;
    Some(vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        name: deployment.name_any(),
        uid,
        ..Default::default()
    }])
}

/// Scrape configuration for the operator's metrics endpoint.
///
/// # Arguments
///
/// * `options` - Operator options (namespace)
/// * `owner` - The operator `Deployment`, when it was found
#[must_use]
pub fn build_operator_service_monitor(
    options: &OperatorOptions,
    owner: Option<&Deployment>,
) -> ServiceMonitor {
    let mut labels = operator_labels(
        COMPONENT_METRICS,
        "servicemonitor",
        "controller-manager-metrics-monitor",
    );
    labels.insert(
        CONTROL_PLANE.to_string(),
        CONTROL_PLANE_CONTROLLER_MANAGER.to_string(),
    );
    labels.insert(
        MONITORING_COLLECTION_PROFILE.to_string(),
        MONITORING_COLLECTION_PROFILE_FULL.to_string(),
    );
    labels.insert(USER_MONITORING.to_string(), "false".to_string());

    ServiceMonitor {
        metadata: ObjectMeta {
            name: Some(OPERATOR_SERVICE_MONITOR_NAME.to_string()),
            namespace: Some(options.namespace.clone()),
            labels: Some(labels),
            owner_references: owner.and_then(deployment_owner),
            ..Default::default()
        },
        spec: ServiceMonitorSpec {
            endpoints: vec![MonitorEndpoint {
                port: Some("metrics".to_string()),
                path: Some(APP_SERVER_METRICS_PATH.to_string()),
                interval: Some(SCRAPE_INTERVAL.to_string()),
                scheme: Some("https".to_string()),
                bearer_token_secret: None,
                tls_config: Some(MonitorTlsConfig {
                    ca_file: Some(PROMETHEUS_CA_FILE.to_string()),
                    cert_file: Some(format!("{PROMETHEUS_CLIENT_CERT_DIR}/{TLS_CERT_FILE}")),
                    key_file: Some(format!("{PROMETHEUS_CLIENT_CERT_DIR}/{TLS_KEY_FILE}")),
                    server_name: Some(format!(
                        "{OPERATOR_SERVICE_NAME}.{}.svc",
                        options.namespace
                    )),
                    insecure_skip_verify: Some(false),
                }),
            }],
            job_label: Some(K8S_NAME.to_string()),
            namespace_selector: None,
            selector: LabelSelector {
                match_labels: Some(operator_selector_labels()),
                ..Default::default()
            },
        },
    }
}

/// Ingress to the operator's metrics port from the cluster Prometheus only.
#[must_use]
pub fn build_operator_network_policy(options: &OperatorOptions) -> NetworkPolicy {
    NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(OPERATOR_NETWORK_POLICY_NAME.to_string()),
            namespace: Some(options.namespace.clone()),
            labels: Some(operator_labels(
                "manager",
                "networkpolicy",
                OPERATOR_NETWORK_POLICY_NAME,
            )),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: Some(LabelSelector {
                match_labels: Some(operator_selector_labels()),
                ..Default::default()
            }),
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![prometheus_peer()]),
                ports: Some(vec![NetworkPolicyPort {
                    port: Some(IntOrString::Int(OPERATOR_METRICS_PORT)),
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

#[cfg(test)]
#[path = "operator_tests.rs"]
mod operator_tests;
