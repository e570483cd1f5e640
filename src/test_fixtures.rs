// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::constants::{
    API_TOKEN_KEY, CONSOLE_CR_NAME, CONSOLE_UI_SERVICE_CERT_SECRET_NAME, DEFAULT_NAMESPACE,
    KUBE_ROOT_CA_CONFIGMAP_NAME, OLS_CERTS_SECRET_NAME, OLS_CONFIG_NAME, TLS_CERT_FILE,
    TLS_KEY_FILE,
};
use crate::context::{Context, OcpVersion, PassInput};
use crate::crd::{
    LlmSpec, LocalReference, ModelSpec, OLSConfig, OLSConfigSpec, OlsSpec, ProviderSpec,
};
use crate::external_types::{Console, ConsoleSpec};
use crate::options::OperatorOptions;
use crate::store::MemoryStore;

pub(crate) const TEST_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
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

pub(crate) const PROXY_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
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

pub(crate) const TEST_PROVIDER: &str = "testProvider";
pub(crate) const TEST_PROVIDER_SECRET: &str = "test-secret";

pub(crate) fn ols_config() -> OLSConfig {
    let mut cr = OLSConfig::new(
        OLS_CONFIG_NAME,
        OLSConfigSpec {
            llm: LlmSpec {
                providers: vec![ProviderSpec {
                    name: TEST_PROVIDER.to_string(),
                    url: Some("https://testURL".to_string()),
                    credentials_secret_ref: LocalReference {
                        name: TEST_PROVIDER_SECRET.to_string(),
                    },
                    models: vec![ModelSpec {
                        name: "testModel".to_string(),
                        ..Default::default()
                    }],
                    provider_type: "bam".to_string(),
                    ..Default::default()
                }],
            },
            ols: OlsSpec {
                default_model: "testModel".to_string(),
                default_provider: Some(TEST_PROVIDER.to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    );
    cr.metadata.uid = Some("ols-config-uid".to_string());
    cr
}

pub(crate) fn pass_input() -> PassInput {
    PassInput {
        cr: ols_config(),
        version: OcpVersion {
            major: "4".to_string(),
            minor: "16".to_string(),
        },
        telemetry_enabled: false,
    }
}

pub(crate) fn test_options() -> OperatorOptions {
    OperatorOptions {
        cluster_version_override: Some("4.16".to_string()),
        tls_poll_interval: Duration::from_millis(5),
        tls_wait_timeout: Duration::from_millis(50),
        ..OperatorOptions::default()
    }
}

pub(crate) fn test_context() -> Context<MemoryStore> {
    Context::new(MemoryStore::new(), test_options())
}

pub(crate) fn secret(name: &str, data: &[(&str, &[u8])]) -> Secret {
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

pub(crate) fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

/// Seed the objects other actors provide: provider credentials, the
/// service-CA-issued TLS secrets and the cluster root CA.
pub(crate) fn seed_dependencies(store: &MemoryStore) {
    store
        .put(&secret(TEST_PROVIDER_SECRET, &[(API_TOKEN_KEY, b"token")]))
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
        .put(&config_map(
            KUBE_ROOT_CA_CONFIGMAP_NAME,
            &[("ca.crt", TEST_CA_PEM)],
        ))
        .unwrap();
}

/// Cluster `Console` with the given plugins and one field owned by the
/// console operator.
pub(crate) fn console(plugins: &[&str]) -> Console {
    Console::new(
        CONSOLE_CR_NAME,
        ConsoleSpec {
            plugins: plugins.iter().map(|p| (*p).to_string()).collect(),
            rest: BTreeMap::from([(
                "managementState".to_string(),
                serde_json::json!("Managed"),
            )]),
        },
    )
}
