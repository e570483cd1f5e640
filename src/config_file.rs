// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The `olsconfig.yaml` document consumed by the app server.
//!
//! The structs below mirror the file the app server parses at startup. Field
//! declaration order is the serialized key order, and `serde_yaml` emits
//! struct fields in declaration order, so the same [`PassInput`] always yields
//! byte-identical YAML. Optional sections use `Option` or empty `Vec` with
//! `skip_serializing_if`, so disabling a feature removes its keys entirely.
//!
//! # Example
//!
//! ```yaml
//! llm_providers:
//!   - name: testProvider
//!     url: https://testURL
//!     credentials_path: /etc/apikeys/test-secret
//!     models:
//!       - name: testModel
//!     type: bam
//! ols_config:
//!   default_model: testModel
//!   default_provider: testProvider
//!   conversation_cache:
//!     type: postgres
//!     postgres:
//!       host: lightspeed-postgres-server.openshift-lightspeed.svc
//!       port: 5432
//! dev_config:
//!   disable_auth: false
//!   disable_tls: false
//! ```

use serde::Serialize;
use std::collections::BTreeMap;

use crate::certificates::validate_ca_bundle;
use crate::constants::{
    API_KEY_MOUNT_ROOT, APP_ADDITIONAL_CA_CERT_DIR, APP_CERTS_MOUNT_ROOT, AZURE_OPENAI_TYPE,
    CERT_BUNDLE_VOLUME_NAME, CREDENTIALS_MOUNT_ROOT, EMBEDDINGS_MODEL_PATH, OCP_DOCS_INDEX_ROOT,
    OLS_CERTS_SECRET_NAME, OLS_USER_DATA_MOUNT_PATH, OPENSHIFT_MCP_SERVER_PORT,
    OPENSHIFT_MCP_SERVER_SSE_READ_TIMEOUT, OPENSHIFT_MCP_SERVER_TIMEOUT, PASSWORD_FILE_NAME,
    POSTGRES_CA_VOLUME, POSTGRES_CERTS_SECRET_NAME, POSTGRES_DEFAULT_DB_NAME,
    POSTGRES_DEFAULT_SSL_MODE, POSTGRES_DEFAULT_USER, POSTGRES_SERVICE_NAME, POSTGRES_SERVICE_PORT,
    PROXY_CA_CERT_FILE_NAME, PROXY_CA_VOLUME_NAME, RAG_VOLUME_MOUNT_PATH, REDIS_CA_VOLUME,
    REDIS_CERTS_SECRET_NAME, REDIS_MAX_MEMORY, REDIS_MAX_MEMORY_POLICY, REDIS_SERVICE_NAME,
    REDIS_SERVICE_PORT, SERVICE_CA_CERT_FILE_NAME, TLS_CERT_FILE, TLS_KEY_FILE, USER_CA_CERT_DIR,
};
use crate::context::PassInput;
use crate::crd::{CacheType, OlsSpec, ProviderSpec};
use crate::errors::{OperatorError, Result};

/// Log level used when the custom resource leaves it unset.
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Seconds between quota scheduler runs.
const QUOTA_SCHEDULER_PERIOD: u32 = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfigFile {
    pub llm_providers: Vec<ProviderConfig>,
    pub ols_config: OlsConfig,
    pub dev_config: DevConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_collector_config: Option<UserDataCollectorConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelConfig>,
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_openai_config: Option<AzureOpenAiConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AzureOpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub credentials_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ModelParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens_for_response: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OlsConfig {
    pub default_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    pub logging_config: LoggingConfig,
    pub conversation_cache: ConversationCacheConfig,
    pub tls_config: TlsPaths,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query_filters: Vec<QueryFilter>,
    pub reference_content: ReferenceContent,
    pub user_data_collection: UserDataCollection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_ca: Vec<String>,
    pub certificate_directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_handlers: Option<QuotaHandlers>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub app_log_level: String,
    pub lib_log_level: String,
    pub uvicorn_log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationCacheConfig {
    #[serde(rename = "type")]
    pub cache_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresCacheConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisCacheConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostgresCacheConfig {
    pub host: String,
    pub port: i32,
    pub user: String,
    pub dbname: String,
    pub password_path: String,
    pub ssl_mode: String,
    pub ca_cert_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedisCacheConfig {
    pub host: String,
    pub port: i32,
    pub max_memory: String,
    pub max_memory_policy: String,
    pub password_path: String,
    pub ca_cert_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsPaths {
    pub tls_certificate_path: String,
    pub tls_key_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFilter {
    pub name: String,
    pub pattern: String,
    pub replace_with: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceContent {
    pub embeddings_model_path: String,
    pub indexes: Vec<ReferenceIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceIndex {
    pub product_docs_index_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_docs_index_id: Option<String>,
    pub product_docs_origin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDataCollection {
    pub feedback_disabled: bool,
    pub feedback_storage: String,
    pub transcripts_disabled: bool,
    pub transcripts_storage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_ca_cert_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaHandlers {
    pub storage: PostgresCacheConfig,
    pub scheduler: QuotaScheduler,
    pub limiters: Vec<QuotaLimiter>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub enable_token_history: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaScheduler {
    pub period: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaLimiter {
    pub name: String,
    #[serde(rename = "type")]
    pub limiter_type: String,
    pub initial_quota: i64,
    pub quota_increase: i64,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevConfig {
    pub disable_auth: bool,
    pub disable_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDataCollectorConfig {
    pub data_storage: String,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: String,
    pub streamable_http: StreamableHttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamableHttpConfig {
    pub url: String,
    pub timeout: u32,
    pub sse_read_timeout: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// CA configmap content the generated document depends on.
///
/// Fetched by the reconciler before generation; the maps are configmap
/// `data`, so entries are visited in sorted key order.
#[derive(Debug, Clone, Default)]
pub struct ReferencedCertificates {
    /// `kube-root-ca.crt` in the operator namespace
    pub cluster_root_ca: BTreeMap<String, String>,
    /// The configmap named by `additionalCAConfigMapRef`, when set
    pub additional_ca: Option<BTreeMap<String, String>>,
    /// The configmap named by `proxyCACertificateRef`, when set
    pub proxy_ca: Option<BTreeMap<String, String>>,
}

fn cert_path(parts: &[&str]) -> String {
    let mut path = APP_CERTS_MOUNT_ROOT.to_string();
    for part in parts {
        path.push('/');
        path.push_str(part);
    }
    path
}

/// Directory the API key secret of a provider is mounted under.
#[must_use]
pub fn provider_credentials_path(secret_name: &str) -> String {
    format!("{API_KEY_MOUNT_ROOT}/{secret_name}")
}

/// Directory the cache backend password secret is mounted under.
#[must_use]
pub fn cache_credentials_path(secret_name: &str) -> String {
    format!("{CREDENTIALS_MOUNT_ROOT}/{secret_name}")
}

/// Mount path of the postgres service CA inside the app server pod.
#[must_use]
pub fn postgres_ca_mount_path() -> String {
    cert_path(&[POSTGRES_CERTS_SECRET_NAME, POSTGRES_CA_VOLUME])
}

/// Mount path of the redis service CA inside the app server pod.
#[must_use]
pub fn redis_ca_mount_path() -> String {
    cert_path(&[REDIS_CERTS_SECRET_NAME, REDIS_CA_VOLUME])
}

/// Mount path of the app server TLS key pair, whichever secret provides it.
#[must_use]
pub fn app_tls_mount_path() -> String {
    cert_path(&[OLS_CERTS_SECRET_NAME])
}

/// Name of the postgres password secret for this custom resource.
#[must_use]
pub fn postgres_secret_name(ols: &OlsSpec) -> &str {
    ols.conversation_cache
        .postgres
        .credentials_secret
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(crate::constants::POSTGRES_SECRET_NAME)
}

/// Name of the redis password secret for this custom resource.
#[must_use]
pub fn redis_secret_name(ols: &OlsSpec) -> &str {
    ols.conversation_cache
        .redis
        .credentials_secret
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(crate::constants::REDIS_SECRET_NAME)
}

fn provider_config(provider: &ProviderSpec) -> ProviderConfig {
    let credentials_path = provider_credentials_path(&provider.credentials_secret_ref.name);
    let models = provider
        .models
        .iter()
        .map(|model| ModelConfig {
            name: model.name.clone(),
            url: model.url.clone(),
            context_window_size: model.context_window_size,
            parameters: model.parameters.as_ref().map(|p| ModelParameters {
                max_tokens_for_response: p.max_tokens_for_response,
            }),
        })
        .collect();

    if provider.provider_type == AZURE_OPENAI_TYPE {
        ProviderConfig {
            name: provider.name.clone(),
            url: None,
            credentials_path: None,
            models,
            provider_type: provider.provider_type.clone(),
            project_id: None,
            api_version: provider.api_version.clone(),
            azure_openai_config: Some(AzureOpenAiConfig {
                url: provider.url.clone(),
                credentials_path,
                deployment_name: provider.deployment_name.clone(),
            }),
        }
    } else {
        ProviderConfig {
            name: provider.name.clone(),
            url: provider.url.clone(),
            credentials_path: Some(credentials_path),
            models,
            provider_type: provider.provider_type.clone(),
            project_id: provider.project_id.clone(),
            api_version: None,
            azure_openai_config: None,
        }
    }
}

fn postgres_cache_config(ols: &OlsSpec, namespace: &str) -> PostgresCacheConfig {
    let postgres = &ols.conversation_cache.postgres;
    PostgresCacheConfig {
        host: format!("{POSTGRES_SERVICE_NAME}.{namespace}.svc"),
        port: POSTGRES_SERVICE_PORT,
        user: postgres
            .user
            .clone()
            .unwrap_or_else(|| POSTGRES_DEFAULT_USER.to_string()),
        dbname: postgres
            .db_name
            .clone()
            .unwrap_or_else(|| POSTGRES_DEFAULT_DB_NAME.to_string()),
        password_path: format!(
            "{}/{PASSWORD_FILE_NAME}",
            cache_credentials_path(postgres_secret_name(ols))
        ),
        ssl_mode: POSTGRES_DEFAULT_SSL_MODE.to_string(),
        ca_cert_path: format!("{}/{SERVICE_CA_CERT_FILE_NAME}", postgres_ca_mount_path()),
    }
}

fn redis_cache_config(ols: &OlsSpec, namespace: &str) -> RedisCacheConfig {
    let redis = &ols.conversation_cache.redis;
    RedisCacheConfig {
        host: format!("{REDIS_SERVICE_NAME}.{namespace}.svc"),
        port: REDIS_SERVICE_PORT,
        max_memory: redis
            .max_memory
            .clone()
            .unwrap_or_else(|| REDIS_MAX_MEMORY.to_string()),
        max_memory_policy: redis
            .max_memory_policy
            .clone()
            .unwrap_or_else(|| REDIS_MAX_MEMORY_POLICY.to_string()),
        password_path: format!(
            "{}/{PASSWORD_FILE_NAME}",
            cache_credentials_path(redis_secret_name(ols))
        ),
        ca_cert_path: format!("{}/{SERVICE_CA_CERT_FILE_NAME}", redis_ca_mount_path()),
    }
}

fn conversation_cache(ols: &OlsSpec, namespace: &str) -> ConversationCacheConfig {
    let cache_type = ols.conversation_cache.cache_type;
    ConversationCacheConfig {
        cache_type: cache_type.as_str().to_string(),
        postgres: (cache_type == CacheType::Postgres)
            .then(|| postgres_cache_config(ols, namespace)),
        redis: (cache_type == CacheType::Redis).then(|| redis_cache_config(ols, namespace)),
    }
}

fn reference_indexes(input: &PassInput) -> Vec<ReferenceIndex> {
    let version = &input.version;
    let mut indexes: Vec<ReferenceIndex> = input
        .cr
        .spec
        .ols
        .rag
        .iter()
        .enumerate()
        .map(|(i, rag)| ReferenceIndex {
            product_docs_index_path: format!("{RAG_VOLUME_MOUNT_PATH}/rag-{i}"),
            product_docs_index_id: rag.index_id.clone(),
            product_docs_origin: rag.image.clone(),
        })
        .collect();

    indexes.push(ReferenceIndex {
        product_docs_index_path: format!("{OCP_DOCS_INDEX_ROOT}/{}.{}", version.major, version.minor),
        product_docs_index_id: Some(format!(
            "ocp-product-docs-{}_{}",
            version.major, version.minor
        )),
        product_docs_origin: format!(
            "Red Hat OpenShift {}.{} documentation",
            version.major, version.minor
        ),
    });
    indexes
}

/// Validate every entry of a CA configmap and return the mounted file paths.
fn ca_file_paths(
    data: &BTreeMap<String, String>,
    directory: &str,
    subject: &'static str,
) -> Result<Vec<String>> {
    data.iter()
        .map(|(key, value)| {
            validate_ca_bundle(value.as_bytes()).map_err(|source| {
                OperatorError::CertificateValidation {
                    subject,
                    name: key.clone(),
                    source,
                }
            })?;
            Ok(cert_path(&[directory, key]))
        })
        .collect()
}

fn proxy_config(
    ols: &OlsSpec,
    certificates: &ReferencedCertificates,
) -> Result<Option<ProxyConfig>> {
    let Some(proxy) = ols.proxy_config.as_ref() else {
        return Ok(None);
    };

    let proxy_ca_cert_path = match (ols.proxy_ca_name(), certificates.proxy_ca.as_ref()) {
        (Some(name), Some(data)) => {
            let pem = data.get(PROXY_CA_CERT_FILE_NAME).ok_or_else(|| {
                OperatorError::invalid(
                    "ConfigMap",
                    name,
                    format!("missing key {PROXY_CA_CERT_FILE_NAME}"),
                )
            })?;
            validate_ca_bundle(pem.as_bytes()).map_err(|source| {
                OperatorError::CertificateValidation {
                    subject: "proxy CA",
                    name: name.to_string(),
                    source,
                }
            })?;
            Some(cert_path(&[PROXY_CA_VOLUME_NAME, PROXY_CA_CERT_FILE_NAME]))
        }
        (Some(name), None) => return Err(OperatorError::missing("ConfigMap", name)),
        (None, _) => None,
    };

    Ok(Some(ProxyConfig {
        proxy_url: proxy.proxy_url.clone(),
        proxy_ca_cert_path,
    }))
}

/// Build the configuration document for one pass.
///
/// # Errors
///
/// Returns [`OperatorError::CertificateValidation`] when any CA entry fails
/// PEM/X.509 parsing and [`OperatorError::MissingDependency`] when a
/// referenced CA configmap was not supplied.
pub fn build_app_config(
    input: &PassInput,
    namespace: &str,
    certificates: &ReferencedCertificates,
) -> Result<AppConfigFile> {
    let spec = &input.cr.spec;
    let ols = &spec.ols;
    let collecting = input.data_collector_enabled();
    let log_level = ols
        .log_level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    let mut extra_ca = ca_file_paths(
        &certificates.cluster_root_ca,
        APP_ADDITIONAL_CA_CERT_DIR,
        "cluster root CA",
    )?;
    if let Some(name) = ols.additional_ca_name() {
        let data = certificates
            .additional_ca
            .as_ref()
            .ok_or_else(|| OperatorError::missing("ConfigMap", name))?;
        extra_ca.extend(ca_file_paths(data, USER_CA_CERT_DIR, "additional CA")?);
    }

    let quota_handlers = ols.quota_handlers_config.as_ref().map(|quota| QuotaHandlers {
        storage: postgres_cache_config(ols, namespace),
        scheduler: QuotaScheduler {
            period: QUOTA_SCHEDULER_PERIOD,
        },
        limiters: quota
            .limiters_config
            .iter()
            .map(|limiter| QuotaLimiter {
                name: limiter.name.clone(),
                limiter_type: limiter.limiter_type.clone(),
                initial_quota: limiter.initial_quota,
                quota_increase: limiter.quota_increase,
                period: limiter.period.clone(),
            })
            .collect(),
        enable_token_history: quota.enable_token_history,
    });

    let ols_config = OlsConfig {
        default_model: ols.default_model.clone(),
        default_provider: ols.default_provider.clone(),
        logging_config: LoggingConfig {
            app_log_level: log_level.clone(),
            lib_log_level: log_level.clone(),
            uvicorn_log_level: log_level,
        },
        conversation_cache: conversation_cache(ols, namespace),
        tls_config: TlsPaths {
            tls_certificate_path: format!("{}/{TLS_CERT_FILE}", app_tls_mount_path()),
            tls_key_path: format!("{}/{TLS_KEY_FILE}", app_tls_mount_path()),
        },
        query_filters: ols
            .query_filters
            .iter()
            .map(|filter| QueryFilter {
                name: filter.name.clone(),
                pattern: filter.pattern.clone(),
                replace_with: filter.replace_with.clone(),
            })
            .collect(),
        reference_content: ReferenceContent {
            embeddings_model_path: EMBEDDINGS_MODEL_PATH.to_string(),
            indexes: reference_indexes(input),
        },
        user_data_collection: UserDataCollection {
            feedback_disabled: ols.user_data_collection.feedback_disabled || !collecting,
            feedback_storage: format!("{OLS_USER_DATA_MOUNT_PATH}/feedback"),
            transcripts_disabled: ols.user_data_collection.transcripts_disabled || !collecting,
            transcripts_storage: format!("{OLS_USER_DATA_MOUNT_PATH}/transcripts"),
        },
        extra_ca,
        certificate_directory: cert_path(&[CERT_BUNDLE_VOLUME_NAME]),
        proxy_config: proxy_config(ols, certificates)?,
        quota_handlers,
    };

    let user_data_collector_config = collecting.then(|| UserDataCollectorConfig {
        data_storage: OLS_USER_DATA_MOUNT_PATH.to_string(),
        log_level: spec
            .ols_data_collector
            .log_level
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
    });

    let mcp_servers = if ols.introspection() {
        vec![McpServerConfig {
            name: "openshift".to_string(),
            transport: "streamable_http".to_string(),
            streamable_http: StreamableHttpConfig {
                url: format!("http://localhost:{OPENSHIFT_MCP_SERVER_PORT}/mcp"),
                timeout: OPENSHIFT_MCP_SERVER_TIMEOUT,
                sse_read_timeout: OPENSHIFT_MCP_SERVER_SSE_READ_TIMEOUT,
                headers: BTreeMap::from([(
                    "Authorization".to_string(),
                    "kubernetes".to_string(),
                )]),
            },
        }]
    } else {
        Vec::new()
    };

    Ok(AppConfigFile {
        llm_providers: spec.llm.providers.iter().map(provider_config).collect(),
        ols_config,
        dev_config: DevConfig {
            disable_auth: false,
            disable_tls: false,
        },
        user_data_collector_config,
        mcp_servers,
    })
}

/// Render the configuration document as YAML.
///
/// # Errors
///
/// Everything [`build_app_config`] returns, plus [`OperatorError::Generation`]
/// if serialization fails.
pub fn render_app_config(
    input: &PassInput,
    namespace: &str,
    certificates: &ReferencedCertificates,
) -> Result<String> {
    let document = build_app_config(input, namespace, certificates)?;
    serde_yaml::to_string(&document).map_err(|e| OperatorError::generation("OLS config file", e))
}

#[cfg(test)]
#[path = "config_file_tests.rs"]
mod config_file_tests;
