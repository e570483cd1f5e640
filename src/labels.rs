// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants and selector label sets used across all generators.
//!
//! Selector labels double as pod selectors, so changing any value here orphans
//! running pods from their Deployments and Services.

use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Label carried by the operator's own pods
pub const CONTROL_PLANE: &str = "control-plane";
pub const CONTROL_PLANE_CONTROLLER_MANAGER: &str = "controller-manager";

// ============================================================================
// Label Values
// ============================================================================

pub const MANAGED_BY_OPERATOR: &str = "lightspeed-operator";
pub const PART_OF_LIGHTSPEED: &str = "openshift-lightspeed";

pub const COMPONENT_APP_SERVER: &str = "application-server";
pub const COMPONENT_CONSOLE_PLUGIN: &str = "console-plugin";
pub const COMPONENT_POSTGRES: &str = "postgres-server";
pub const COMPONENT_REDIS: &str = "redis-server";
pub const COMPONENT_METRICS: &str = "metrics";

pub const APP_NAME_APP_SERVER: &str = "lightspeed-service-api";
pub const APP_NAME_CONSOLE_PLUGIN: &str = "lightspeed-console-plugin";
pub const APP_NAME_POSTGRES: &str = "lightspeed-service-postgres";
pub const APP_NAME_REDIS: &str = "lightspeed-service-redis";

// ============================================================================
// Monitoring Labels
// ============================================================================

pub const MONITORING_COLLECTION_PROFILE: &str = "monitoring.openshift.io/collection-profile";
pub const MONITORING_COLLECTION_PROFILE_FULL: &str = "full";
pub const USER_MONITORING: &str = "openshift.io/user-monitoring";

/// Selector matching the app server's old postgres secrets during rotation cleanup
#[must_use]
pub fn postgres_secret_selector() -> String {
    format!("{K8S_NAME}={APP_NAME_POSTGRES}")
}

/// Selector matching old redis secrets during rotation cleanup
#[must_use]
pub fn redis_secret_selector() -> String {
    format!("{K8S_NAME}={APP_NAME_REDIS}")
}

fn selector_labels(component: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_COMPONENT.to_string(), component.to_string()),
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_OPERATOR.to_string()),
        (K8S_NAME.to_string(), name.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_LIGHTSPEED.to_string()),
    ])
}

/// Selector labels of the operator's own pods.
#[must_use]
pub fn operator_selector_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        CONTROL_PLANE.to_string(),
        CONTROL_PLANE_CONTROLLER_MANAGER.to_string(),
    )])
}

/// Selector labels of the app server pods.
#[must_use]
pub fn app_server_labels() -> BTreeMap<String, String> {
    selector_labels(COMPONENT_APP_SERVER, APP_NAME_APP_SERVER)
}

/// Selector labels of the console plugin pods.
#[must_use]
pub fn console_labels() -> BTreeMap<String, String> {
    selector_labels(COMPONENT_CONSOLE_PLUGIN, APP_NAME_CONSOLE_PLUGIN)
}

/// Selector labels of the postgres pods.
#[must_use]
pub fn postgres_labels() -> BTreeMap<String, String> {
    selector_labels(COMPONENT_POSTGRES, APP_NAME_POSTGRES)
}

/// Selector labels of the redis pods.
#[must_use]
pub fn redis_labels() -> BTreeMap<String, String> {
    selector_labels(COMPONENT_REDIS, APP_NAME_REDIS)
}
