// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end reconciliation scenarios against the in-memory store.
//!
//! Each test drives full passes through the public API and simulates the
//! cluster's own controllers (rollouts, certificate rotation, user edits)
//! between passes.

mod common;

use common::{
    cluster, condition, config_map, container_names, deployment, mark_all_ready, secret,
    template_annotations, CA_PEM, OTHER_CA_PEM, PROVIDER_NAME, PROVIDER_SECRET,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::ByteString;
use lightspeed_operator::constants::{
    ADDITIONAL_CA_HASH_KEY, API_KEY_MOUNT_ROOT, API_TOKEN_KEY, APP_SERVER_CONTAINER_NAME,
    APP_SERVER_DEPLOYMENT_NAME,
    APP_SERVER_NETWORK_POLICY_NAME, CONSOLE_CR_NAME, CONSOLE_UI_DEPLOYMENT_NAME,
    CONSOLE_UI_PLUGIN_NAME, DEFAULT_NAMESPACE, LLM_PROVIDER_HASH_KEY, OLS_APP_TLS_HASH_KEY,
    OLS_CERTS_SECRET_NAME, OLS_CONFIG_CM_NAME, OLS_CONFIG_FILENAME, OLS_CONFIG_HASH_KEY,
    OLS_CONFIG_NAME, OPENSHIFT_MCP_SERVER_CONTAINER_NAME, POSTGRES_DEPLOYMENT_NAME,
    POSTGRES_PASSWORD_KEY, POSTGRES_SECRET_HASH_KEY, POSTGRES_SECRET_NAME, TLS_CERT_FILE,
    TLS_KEY_FILE,
};
use lightspeed_operator::context::Context;
use lightspeed_operator::crd::{LocalReference, OLSConfig};
use lightspeed_operator::errors::ErrorKind;
use lightspeed_operator::external_types::{Console, ConsolePlugin};
use lightspeed_operator::reconcilers::{reconcile_olsconfig, PassResult};
use lightspeed_operator::status_reasons::{
    CONDITION_TYPE_API_READY, CONDITION_TYPE_RECONCILED, STATUS_FALSE, STATUS_TRUE,
};
use lightspeed_operator::store::{MemoryStore, ObjectStore, StoredObject, Verb};
use std::collections::{BTreeMap, BTreeSet};

fn edit_cr(ctx: &Context<MemoryStore>, edit: impl FnOnce(&mut OLSConfig)) {
    let mut cr: OLSConfig = ctx.store.fetch(None, OLS_CONFIG_NAME).unwrap();
    edit(&mut cr);
    ctx.store.put(&cr).unwrap();
}

#[tokio::test]
async fn test_initial_creation_deploys_every_subsystem() {
    let ctx = cluster();

    let outcome = reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();

    assert_eq!(outcome, PassResult::InProgress);
    for name in [
        CONSOLE_UI_DEPLOYMENT_NAME,
        POSTGRES_DEPLOYMENT_NAME,
        APP_SERVER_DEPLOYMENT_NAME,
    ] {
        assert!(ctx
            .store
            .fetch::<Deployment>(Some(DEFAULT_NAMESPACE), name)
            .is_some());
    }
    assert!(ctx
        .store
        .fetch::<ConfigMap>(Some(DEFAULT_NAMESPACE), OLS_CONFIG_CM_NAME)
        .is_some());
    assert!(ctx
        .store
        .fetch::<Secret>(Some(DEFAULT_NAMESPACE), POSTGRES_SECRET_NAME)
        .is_some());
    assert!(ctx
        .store
        .fetch::<ConsolePlugin>(None, CONSOLE_UI_PLUGIN_NAME)
        .is_some());
    let console: Console = ctx.store.fetch(None, CONSOLE_CR_NAME).unwrap();
    assert_eq!(console.spec.plugins, vec![CONSOLE_UI_PLUGIN_NAME.to_string()]);

    let config = ctx
        .store
        .fetch::<ConfigMap>(Some(DEFAULT_NAMESPACE), OLS_CONFIG_CM_NAME)
        .and_then(|cm| cm.data)
        .unwrap();
    let document: serde_yaml::Value = serde_yaml::from_str(&config[OLS_CONFIG_FILENAME]).unwrap();
    assert_eq!(document["llm_providers"][0]["name"].as_str(), Some(PROVIDER_NAME));
    assert_eq!(
        document["ols_config"]["conversation_cache"]["type"].as_str(),
        Some("postgres")
    );

    let pod = deployment(&ctx.store, APP_SERVER_DEPLOYMENT_NAME)
        .spec
        .and_then(|s| s.template.spec)
        .unwrap();
    assert_eq!(pod.containers.len(), 1);
    assert_eq!(pod.containers[0].name, APP_SERVER_CONTAINER_NAME);
    let api_key_path = format!("{API_KEY_MOUNT_ROOT}/{PROVIDER_SECRET}");
    assert!(pod.containers[0]
        .volume_mounts
        .iter()
        .flatten()
        .any(|m| m.mount_path == api_key_path));

    let annotations = template_annotations(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);
    assert!(annotations.contains_key(OLS_CONFIG_HASH_KEY));
    assert!(annotations.contains_key(OLS_APP_TLS_HASH_KEY));
    assert!(annotations.contains_key(LLM_PROVIDER_HASH_KEY));
}

#[tokio::test]
async fn test_converged_cluster_is_left_alone() {
    let ctx = cluster();
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();
    mark_all_ready(&ctx.store, POSTGRES_DEPLOYMENT_NAME);
    assert_eq!(
        reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap(),
        PassResult::Converged
    );
    ctx.store.reset_counts();

    let outcome = reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();

    assert_eq!(outcome, PassResult::Converged);
    for verb in [Verb::Create, Verb::Update, Verb::Delete, Verb::UpdateStatus] {
        assert_eq!(ctx.store.total_writes(verb), 0, "{verb:?}");
    }
    assert_eq!(
        condition(&ctx.store, CONDITION_TYPE_RECONCILED).status,
        STATUS_TRUE
    );
}

#[tokio::test]
async fn test_drift_is_repaired() {
    let ctx = cluster();
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();
    let original = deployment(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);

    ctx.store
        .delete::<NetworkPolicy>(Some(DEFAULT_NAMESPACE), APP_SERVER_NETWORK_POLICY_NAME)
        .await
        .unwrap();
    let mut drifted = original.clone();
    if let Some(spec) = drifted.spec.as_mut() {
        spec.replicas = Some(5);
    }
    ctx.store.put(&drifted).unwrap();
    ctx.store.reset_counts();

    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();

    assert!(ctx
        .store
        .fetch::<NetworkPolicy>(Some(DEFAULT_NAMESPACE), APP_SERVER_NETWORK_POLICY_NAME)
        .is_some());
    let repaired = deployment(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);
    assert_eq!(repaired.spec.and_then(|s| s.replicas), Some(1));
    assert_eq!(original.spec.and_then(|s| s.replicas), Some(1));
    assert_eq!(ctx.store.writes::<NetworkPolicy>(Verb::Create), 1);
    assert_eq!(ctx.store.writes::<Deployment>(Verb::Update), 1);
    assert_eq!(ctx.store.writes::<Service>(Verb::Update), 0);
}

#[tokio::test]
async fn test_tls_rotation_restarts_only_the_app_server() {
    let ctx = cluster();
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();
    let before = template_annotations(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);
    let console_before = template_annotations(&ctx.store, CONSOLE_UI_DEPLOYMENT_NAME);

    ctx.store
        .put(&secret(
            OLS_CERTS_SECRET_NAME,
            &[(TLS_KEY_FILE, b"rotated-key"), (TLS_CERT_FILE, b"rotated-cert")],
        ))
        .unwrap();
    ctx.store.reset_counts();
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();

    let after = template_annotations(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);
    assert_ne!(before[OLS_APP_TLS_HASH_KEY], after[OLS_APP_TLS_HASH_KEY]);
    assert_eq!(before[OLS_CONFIG_HASH_KEY], after[OLS_CONFIG_HASH_KEY]);
    assert_eq!(
        console_before,
        template_annotations(&ctx.store, CONSOLE_UI_DEPLOYMENT_NAME)
    );
    assert_eq!(ctx.store.writes::<Deployment>(Verb::Update), 1);
}

#[tokio::test]
async fn test_malformed_additional_ca_fails_the_app_server_only() {
    let ctx = cluster();
    ctx.store
        .put(&config_map("user-ca", &[("bad.crt", "not a certificate")]))
        .unwrap();
    edit_cr(&ctx, |cr| {
        cr.spec.ols.additional_ca_config_map_ref = Some(LocalReference {
            name: "user-ca".to_string(),
        });
    });

    let err = reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap_err();

    assert_eq!(err.root_kind(), ErrorKind::CertificateValidation);
    assert!(ctx
        .store
        .fetch::<ConfigMap>(Some(DEFAULT_NAMESPACE), OLS_CONFIG_CM_NAME)
        .is_none());
    assert!(ctx
        .store
        .fetch::<Deployment>(Some(DEFAULT_NAMESPACE), APP_SERVER_DEPLOYMENT_NAME)
        .is_none());
    assert!(ctx
        .store
        .fetch::<Deployment>(Some(DEFAULT_NAMESPACE), POSTGRES_DEPLOYMENT_NAME)
        .is_some());

    let api_ready = condition(&ctx.store, CONDITION_TYPE_API_READY);
    assert_eq!(api_ready.status, STATUS_FALSE);
    assert!(api_ready
        .message
        .unwrap_or_default()
        .contains("failed to validate additional CA certificate"));
}

#[tokio::test]
async fn test_introspection_toggle_is_symmetric() {
    let ctx = cluster();
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();
    let original = container_names(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);

    edit_cr(&ctx, |cr| cr.spec.ols.introspection_enabled = Some(true));
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();
    let enabled = container_names(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);
    assert!(enabled.contains(&OPENSHIFT_MCP_SERVER_CONTAINER_NAME.to_string()));

    edit_cr(&ctx, |cr| cr.spec.ols.introspection_enabled = Some(false));
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();

    assert_eq!(
        container_names(&ctx.store, APP_SERVER_DEPLOYMENT_NAME),
        original
    );
}

#[tokio::test]
async fn test_same_inputs_generate_same_objects() {
    let first = cluster();
    let second = cluster();

    reconcile_olsconfig(&first, OLS_CONFIG_NAME).await.unwrap();
    reconcile_olsconfig(&second, OLS_CONFIG_NAME).await.unwrap();

    let config = |ctx: &Context<MemoryStore>| {
        ctx.store
            .fetch::<ConfigMap>(Some(DEFAULT_NAMESPACE), OLS_CONFIG_CM_NAME)
            .and_then(|cm| cm.data)
            .unwrap()
    };
    assert_eq!(config(&first), config(&second));

    let pod = |ctx: &Context<MemoryStore>| {
        deployment(&ctx.store, APP_SERVER_DEPLOYMENT_NAME)
            .spec
            .and_then(|s| s.template.spec)
            .unwrap()
    };
    assert_eq!(pod(&first).containers, pod(&second).containers);
    assert_eq!(pod(&first).volumes, pod(&second).volumes);
}

// ============================================================================
// Rolling-update triggers: one changed input moves exactly one annotation
// ============================================================================

const USER_CA: &str = "user-ca";

/// Keys whose value differs between two annotation maps, including keys
/// present on one side only.
fn changed_keys(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<String> {
    before
        .keys()
        .chain(after.keys())
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A reconciled cluster that also references a user additional CA.
async fn settled_cluster() -> (Context<MemoryStore>, BTreeMap<String, String>) {
    let ctx = cluster();
    ctx.store
        .put(&config_map(USER_CA, &[("ca.crt", CA_PEM)]))
        .unwrap();
    edit_cr(&ctx, |cr| {
        cr.spec.ols.additional_ca_config_map_ref = Some(LocalReference {
            name: USER_CA.to_string(),
        });
    });
    reconcile_olsconfig(&ctx, OLS_CONFIG_NAME).await.unwrap();
    let settled = template_annotations(&ctx.store, APP_SERVER_DEPLOYMENT_NAME);
    assert!(settled.contains_key(ADDITIONAL_CA_HASH_KEY));
    assert!(settled.contains_key(POSTGRES_SECRET_HASH_KEY));
    (ctx, settled)
}

/// Run one pass and report which app server template annotations moved.
async fn rolled_keys(
    ctx: &Context<MemoryStore>,
    before: &BTreeMap<String, String>,
) -> Vec<String> {
    ctx.store.reset_counts();
    reconcile_olsconfig(ctx, OLS_CONFIG_NAME).await.unwrap();
    changed_keys(
        before,
        &template_annotations(&ctx.store, APP_SERVER_DEPLOYMENT_NAME),
    )
}

async fn recreate<K: StoredObject>(
    ctx: &Context<MemoryStore>,
    name: &str,
    replacement: &K,
) {
    ctx.store
        .delete::<K>(Some(DEFAULT_NAMESPACE), name)
        .await
        .unwrap();
    ctx.store.put(replacement).unwrap();
}

#[tokio::test]
async fn test_unchanged_inputs_roll_nothing() {
    let (ctx, before) = settled_cluster().await;

    assert!(rolled_keys(&ctx, &before).await.is_empty());
    assert_eq!(ctx.store.writes::<Deployment>(Verb::Update), 0);
}

#[tokio::test]
async fn test_provider_credential_change_rolls_provider_hash() {
    let (ctx, before) = settled_cluster().await;
    ctx.store
        .put(&secret(PROVIDER_SECRET, &[(API_TOKEN_KEY, b"sk-rotated")]))
        .unwrap();

    assert_eq!(rolled_keys(&ctx, &before).await, vec![LLM_PROVIDER_HASH_KEY]);
}

#[tokio::test]
async fn test_provider_secret_recreation_rolls_provider_hash() {
    let (ctx, before) = settled_cluster().await;
    recreate(
        &ctx,
        PROVIDER_SECRET,
        &secret(PROVIDER_SECRET, &[(API_TOKEN_KEY, b"sk-recreated")]),
    )
    .await;

    assert_eq!(rolled_keys(&ctx, &before).await, vec![LLM_PROVIDER_HASH_KEY]);
}

#[tokio::test]
async fn test_tls_secret_recreation_rolls_tls_hash() {
    let (ctx, before) = settled_cluster().await;
    recreate(
        &ctx,
        OLS_CERTS_SECRET_NAME,
        &secret(
            OLS_CERTS_SECRET_NAME,
            &[(TLS_KEY_FILE, b"reissued-key"), (TLS_CERT_FILE, b"reissued-cert")],
        ),
    )
    .await;

    assert_eq!(rolled_keys(&ctx, &before).await, vec![OLS_APP_TLS_HASH_KEY]);
}

#[tokio::test]
async fn test_additional_ca_change_rolls_ca_hash() {
    let (ctx, before) = settled_cluster().await;
    ctx.store
        .put(&config_map(USER_CA, &[("ca.crt", OTHER_CA_PEM)]))
        .unwrap();

    assert_eq!(rolled_keys(&ctx, &before).await, vec![ADDITIONAL_CA_HASH_KEY]);
}

#[tokio::test]
async fn test_additional_ca_recreation_rolls_on_new_content_only() {
    let (ctx, before) = settled_cluster().await;

    recreate(&ctx, USER_CA, &config_map(USER_CA, &[("ca.crt", CA_PEM)])).await;
    assert!(rolled_keys(&ctx, &before).await.is_empty());

    recreate(&ctx, USER_CA, &config_map(USER_CA, &[("ca.crt", OTHER_CA_PEM)])).await;
    assert_eq!(rolled_keys(&ctx, &before).await, vec![ADDITIONAL_CA_HASH_KEY]);
}

#[tokio::test]
async fn test_cache_password_rotation_rolls_cache_hash() {
    let (ctx, before) = settled_cluster().await;
    let mut password: Secret = ctx
        .store
        .fetch(Some(DEFAULT_NAMESPACE), POSTGRES_SECRET_NAME)
        .unwrap();
    password.data.get_or_insert_with(BTreeMap::new).insert(
        POSTGRES_PASSWORD_KEY.to_string(),
        ByteString(b"rotated-password".to_vec()),
    );
    ctx.store.put(&password).unwrap();

    assert_eq!(rolled_keys(&ctx, &before).await, vec![POSTGRES_SECRET_HASH_KEY]);
}

#[tokio::test]
async fn test_config_document_change_rolls_config_hash() {
    let (ctx, before) = settled_cluster().await;
    edit_cr(&ctx, |cr| cr.spec.ols.log_level = Some("DEBUG".to_string()));

    assert_eq!(rolled_keys(&ctx, &before).await, vec![OLS_CONFIG_HASH_KEY]);
}
