// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use lightspeed_operator::constants::{
    API_TOKEN_KEY, APP_SERVER_DEPLOYMENT_NAME, CONSOLE_CR_NAME,
    CONSOLE_UI_DEPLOYMENT_NAME, CONSOLE_UI_SERVICE_CERT_SECRET_NAME, DEFAULT_NAMESPACE,
    KUBE_ROOT_CA_CONFIGMAP_NAME, OLS_CERTS_SECRET_NAME, OLS_CONFIG_NAME, TLS_CERT_FILE,
    TLS_KEY_FILE,
};
use lightspeed_operator::context::Context;
use lightspeed_operator::crd::{
    Condition, LlmSpec, LocalReference, ModelSpec, OLSConfig, OLSConfigSpec, OlsSpec,
    ProviderSpec,
};
use lightspeed_operator::external_types::{Console, ConsoleSpec};
use lightspeed_operator::options::OperatorOptions;
use lightspeed_operator::store::MemoryStore;
use std::collections::BTreeMap;
use std::time::Duration;

pub const PROVIDER_NAME: &str = "openai";
pub const PROVIDER_SECRET: &str = "openai-credentials";

pub const CA_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIBejCCASGgAwIBAgIUG3bpcWWG6S9wCOTsfpmsyT/v71IwCgYIKoZIzj0EAwIw
EjEQMA4GA1UEAwwHdGVzdC1jYTAgFw0yNjEwMTkxMDIwMzNaGA8yMTI2MDkyNTEw
MjAzM1owEjEQMA4GA1UEAwwHdGVzdC1jYTBZMBMGByqGSM49AgEGCCqGSM49AwEH
A0IABBf5ZVORElv+4O0zFDd5KjX6NXANVaeYgC5JeQZVp639R47TnWZxkLgS32GJ
fAsWVLQLLl9bu1PyTDLJzNGV9KqjUzBRMB0GA1UdDgQWBBSeoiVgLkzi8tFfof2n
VlekTX4c1jAfBgNVHSMEGDAWgBSeoiVgLkzi8tFfof2nVlekTX4c1jAPBgNVHRMB
Af8EBTADAQH/MAoGCCqGSM49BAMCA0cAMEQCIF5dx0nFeUi7lIFXvtGdBm7Ep+q9
sONAHWxnGOukqHwPAiAihajTsjk8IxDUPcTorbpToYXPKluDJIOuVifp+nzU4Q==
-----END CERTIFICATE-----
";

/// A second, unrelated CA for certificate rotation scenarios.
pub const OTHER_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIBfDCCASOgAwIBAgIULtUMXtSkF2Z3LRO7eMY9XK75kj8wCgYIKoZIzj0EAwIw
EzERMA8GA1UEAwwIcHJveHktY2EwIBcNMjYxMDE5MTAyMDMzWhgPMjEyNjA5MjUx
MDIwMzNaMBMxETAPBgNVBAMMCHByb3h5LWNhMFkwEwYHKoZIzj0CAQYIKoZIzj0D
AQcDQgAENzLotl2J6/9hkckbV3W+xoiWxR7pHwLVSp5I6ezY9/bGd60bfk5FQ4rH
J2C2PLFEeSyA3lWo0lTvzUSTPltk/qNTMFEwHQYDVR0OBBYEFIqvZYuB6qeNdMdr
gxd+Qnks1mQmMB8GA1UdIwQYMBaAFIqvZYuB6qeNdMdrgxd+Qnks1mQmMA8GA1Ud
EwEB/wQFMAMBAf8wCgYIKoZIzj0EAwIDRwAwRAIgO2e4560/eC9Zapn8q/6oFrlg
GWzm2DNtd9J94QkifW8CIB2JloV8wkvrzoA7x+TM/U5fNpHfviUohrMS04X2uV5I
-----END CERTIFICATE-----
";

/// Options with a pinned cluster version and short TLS waits.
pub fn options() -> OperatorOptions {
    OperatorOptions {
        cluster_version_override: Some("4.16".to_string()),
        tls_poll_interval: Duration::from_millis(5),
        tls_wait_timeout: Duration::from_millis(100),
        ..OperatorOptions::default()
    }
}

/// Minimal `OLSConfig` with one OpenAI provider.
pub fn ols_config() -> OLSConfig {
    OLSConfig::new(
        OLS_CONFIG_NAME,
        OLSConfigSpec {
            llm: LlmSpec {
                providers: vec![ProviderSpec {
                    name: PROVIDER_NAME.to_string(),
                    url: Some("https://api.openai.com/v1".to_string()),
                    credentials_secret_ref: LocalReference {
                        name: PROVIDER_SECRET.to_string(),
                    },
                    models: vec![ModelSpec {
                        name: "gpt-4o-mini".to_string(),
                        ..Default::default()
                    }],
                    provider_type: "openai".to_string(),
                    ..Default::default()
                }],
            },
            ols: OlsSpec {
                default_model: "gpt-4o-mini".to_string(),
                default_provider: Some(PROVIDER_NAME.to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

pub fn secret(name: &str, data: &[(&str, &[u8])]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

/// A cluster with the custom resource and everything other actors provide:
/// provider credentials, service-CA TLS secrets, the root CA and the console.
pub fn cluster() -> Context<MemoryStore> {
    let ctx = Context::new(MemoryStore::new(), options());
    let store = &ctx.store;
    store
        .put(&secret(PROVIDER_SECRET, &[(API_TOKEN_KEY, b"sk-test")]))
        .unwrap();
    store
        .put(&secret(
            OLS_CERTS_SECRET_NAME,
            &[(TLS_KEY_FILE, b"app-key"), (TLS_CERT_FILE, b"app-cert")],
        ))
        .unwrap();
    store
        .put(&secret(
            CONSOLE_UI_SERVICE_CERT_SECRET_NAME,
            &[(TLS_KEY_FILE, b"console-key"), (TLS_CERT_FILE, b"console-cert")],
        ))
        .unwrap();
    store
        .put(&config_map(KUBE_ROOT_CA_CONFIGMAP_NAME, &[("ca.crt", CA_PEM)]))
        .unwrap();
    store
        .put(&Console::new(
            CONSOLE_CR_NAME,
            ConsoleSpec {
                plugins: Vec::new(),
                rest: BTreeMap::new(),
            },
        ))
        .unwrap();
    store.put(&ols_config()).unwrap();
    ctx
}

pub fn deployment(store: &MemoryStore, name: &str) -> Deployment {
    store.fetch(Some(DEFAULT_NAMESPACE), name).unwrap()
}

/// Simulate the deployment controller finishing a rollout.
pub fn mark_ready(store: &MemoryStore, name: &str) {
    let mut live = deployment(store, name);
    let replicas = live.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    live.status = Some(DeploymentStatus {
        replicas: Some(replicas),
        ready_replicas: Some(replicas),
        conditions: Some(vec![DeploymentCondition {
            type_: "Available".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    });
    store.put(&live).unwrap();
}

pub fn mark_all_ready(store: &MemoryStore, cache_deployment: &str) {
    for name in [
        CONSOLE_UI_DEPLOYMENT_NAME,
        cache_deployment,
        APP_SERVER_DEPLOYMENT_NAME,
    ] {
        mark_ready(store, name);
    }
}

pub fn template_annotations(store: &MemoryStore, name: &str) -> BTreeMap<String, String> {
    deployment(store, name)
        .spec
        .and_then(|s| s.template.metadata)
        .and_then(|m| m.annotations)
        .unwrap_or_default()
}

pub fn container_names(store: &MemoryStore, name: &str) -> Vec<String> {
    deployment(store, name)
        .spec
        .and_then(|s| s.template.spec)
        .map(|p| p.containers.into_iter().map(|c| c.name).collect())
        .unwrap_or_default()
}

pub fn conditions(store: &MemoryStore) -> Vec<Condition> {
    let cr: OLSConfig = store.fetch(None, OLS_CONFIG_NAME).unwrap();
    cr.status.map(|s| s.conditions).unwrap_or_default()
}

pub fn condition(store: &MemoryStore, condition_type: &str) -> Condition {
    conditions(store)
        .into_iter()
        .find(|c| c.r#type == condition_type)
        .unwrap()
}
