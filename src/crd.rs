// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for OpenShift Lightspeed.
//!
//! [`OLSConfig`] is a cluster-scoped singleton (named `cluster`) describing the
//! desired Lightspeed deployment: LLM providers, the conversation cache
//! backend, TLS and CA material, deployment sizing, RAG indexes and feature
//! toggles. The controller only reads the spec; it never persists defaults
//! back into it.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: ols.openshift.io/v1alpha1
//! kind: OLSConfig
//! metadata:
//!   name: cluster
//! spec:
//!   llm:
//!     providers:
//!       - name: openai
//!         type: openai
//!         url: https://api.openai.com/v1
//!         credentialsSecretRef:
//!           name: openai-api-keys
//!         models:
//!           - name: gpt-4o-mini
//!   ols:
//!     defaultModel: gpt-4o-mini
//!     defaultProvider: openai
//!     conversationCache:
//!       type: postgres
//! ```
//!
//! Unset optional scalars are `None`, so an explicit zero (for example
//! `replicas: 0`) is never confused with "use the default".

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::OLS_CERTS_SECRET_NAME;

/// Condition represents an observation of the resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: `ApiReady`, `CacheReady`, `ConsolePluginReady` or `Reconciled`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `OLSConfig` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct OLSConfigStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Reference to an object by name in the operator namespace.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct LocalReference {
    pub name: String,
}

/// `OLSConfig` declares the desired OpenShift Lightspeed deployment.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ols.openshift.io",
    version = "v1alpha1",
    kind = "OLSConfig",
    plural = "olsconfigs",
    shortname = "ols",
    doc = "OLSConfig is the Schema for the olsconfigs API. Only the instance named 'cluster' is reconciled."
)]
#[kube(status = "OLSConfigStatus")]
#[serde(rename_all = "camelCase")]
pub struct OLSConfigSpec {
    /// LLM provider settings.
    pub llm: LlmSpec,

    /// App server settings.
    pub ols: OlsSpec,

    /// User data collector settings.
    #[serde(default)]
    pub ols_data_collector: OlsDataCollectorSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LlmSpec {
    /// Providers in declaration order. The order is preserved in the
    /// generated configuration file and in the deployment's volume list.
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Provider name, referenced by `ols.defaultProvider`.
    pub name: String,

    /// Provider API URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Secret holding the provider credentials (`apitoken`, or Azure
    /// `client_id`/`tenant_id`/`client_secret`).
    pub credentials_secret_ref: LocalReference,

    #[serde(default)]
    pub models: Vec<ModelSpec>,

    /// Provider type, e.g. `openai`, `azure_openai`, `watsonx`, `rhoai_vllm`.
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Azure OpenAI deployment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,

    /// Azure OpenAI API version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// watsonx project ID.
    #[serde(rename = "projectID", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Context window size in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ModelParametersSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelParametersSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_for_response: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OlsSpec {
    #[serde(default)]
    pub conversation_cache: ConversationCacheSpec,

    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Log level of the app server (DEBUG, INFO, WARNING, ERROR, CRITICAL). Defaults to INFO.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    pub default_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_filters: Vec<QueryFilterSpec>,

    #[serde(default)]
    pub user_data_collection: UserDataCollectionSpec,

    /// User-provided TLS key pair for the app server. Defaults to the
    /// service-CA-issued `lightspeed-tls` secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    /// Configmap holding extra CA certificates trusted by the app server.
    #[serde(
        rename = "additionalCAConfigMapRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_ca_config_map_ref: Option<LocalReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_handlers_config: Option<QuotaHandlersConfig>,

    /// Runs the OpenShift MCP server sidecar for cluster introspection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_enabled: Option<bool>,

    /// RAG indexes, in declaration order, placed ahead of the product docs index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rag: Vec<RagSpec>,

    /// Hides the Lightspeed icon in the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_icon: Option<bool>,
}

impl OlsSpec {
    /// Name of the secret holding the app server's TLS key pair.
    #[must_use]
    pub fn tls_secret_name(&self) -> &str {
        self.tls_config
            .as_ref()
            .map_or(OLS_CERTS_SECRET_NAME, |tls| tls.key_cert_secret_ref.name.as_str())
    }

    /// Whether the user supplied their own TLS secret.
    #[must_use]
    pub fn has_user_tls(&self) -> bool {
        self.tls_config.is_some()
    }

    #[must_use]
    pub fn introspection(&self) -> bool {
        self.introspection_enabled.unwrap_or(false)
    }

    #[must_use]
    pub fn additional_ca_name(&self) -> Option<&str> {
        self.additional_ca_config_map_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }

    #[must_use]
    pub fn proxy_ca_name(&self) -> Option<&str> {
        self.proxy_config
            .as_ref()
            .and_then(|p| p.proxy_ca_certificate_ref.as_ref())
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Conversation cache backend.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    Postgres,
    Redis,
}

impl CacheType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCacheSpec {
    #[serde(rename = "type", default)]
    pub cache_type: CacheType,

    #[serde(default)]
    pub postgres: PostgresSpec,

    #[serde(default)]
    pub redis: RedisSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostgresSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    /// Secret holding the postgres password. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_buffers: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedisSpec {
    /// Secret holding the redis password. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory_policy: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// App server replicas. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default)]
    pub api: ApiContainerConfig,

    #[serde(default)]
    pub data_collector: ContainerResourcesConfig,

    #[serde(default)]
    pub mcp_server: ContainerResourcesConfig,

    #[serde(default)]
    pub console: ConsoleContainerConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiContainerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleContainerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// CA certificate the console uses to reach the app server. When set, the
    /// app server service is not annotated for a service-CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilterSpec {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub replace_with: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDataCollectionSpec {
    #[serde(default)]
    pub feedback_disabled: bool,

    #[serde(default)]
    pub transcripts_disabled: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub key_cert_secret_ref: LocalReference,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(rename = "proxyURL", default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(
        rename = "proxyCACertificateRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub proxy_ca_certificate_ref: Option<LocalReference>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaHandlersConfig {
    #[serde(default)]
    pub limiters_config: Vec<LimiterConfig>,

    #[serde(default)]
    pub enable_token_history: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LimiterConfig {
    pub name: String,

    /// `user_limiter` or `cluster_limiter`.
    #[serde(rename = "type")]
    pub limiter_type: String,

    pub initial_quota: i64,

    pub quota_increase: i64,

    /// Quota reset period, e.g. `1 day`.
    pub period: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RagSpec {
    /// Image holding the index.
    pub image: String,

    /// Path of the index inside the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<String>,

    #[serde(rename = "indexID", default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OlsDataCollectorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
