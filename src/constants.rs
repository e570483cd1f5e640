// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Lightspeed operator.
//!
//! This module contains the object names, mount paths, ports and defaults used
//! throughout the codebase. Names and paths here are part of the contract with
//! the app server's configuration file and with resources created by earlier
//! operator versions, so renaming any of them is a breaking change.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `OLSConfig` CRD
pub const API_GROUP: &str = "ols.openshift.io";

/// API version for the `OLSConfig` CRD
pub const API_VERSION: &str = "v1alpha1";

/// Kind name for the `OLSConfig` resource
pub const KIND_OLS_CONFIG: &str = "OLSConfig";

/// The only `OLSConfig` name the operator reconciles
pub const OLS_CONFIG_NAME: &str = "cluster";

/// Default namespace for all managed workloads
pub const DEFAULT_NAMESPACE: &str = "openshift-lightspeed";

/// Field manager name reported on writes
pub const OPERATOR_NAME: &str = "lightspeed-operator";

// ============================================================================
// Operator
// ============================================================================

/// The operator's own deployment; owns the operator service monitor
pub const OPERATOR_DEPLOYMENT_NAME: &str = "lightspeed-operator-controller-manager";
pub const OPERATOR_SERVICE_NAME: &str = "lightspeed-operator-controller-manager-service";
pub const OPERATOR_SERVICE_MONITOR_NAME: &str = "controller-manager-metrics-monitor";
pub const OPERATOR_NETWORK_POLICY_NAME: &str = "lightspeed-operator";
pub const OPERATOR_METRICS_PORT: i32 = 8443;

// ============================================================================
// App Server
// ============================================================================

pub const APP_SERVER_SERVICE_ACCOUNT_NAME: &str = "lightspeed-app-server";
pub const APP_SERVER_SAR_ROLE_NAME: &str = "lightspeed-app-server-sar-role";
pub const APP_SERVER_SAR_ROLE_BINDING_NAME: &str = "lightspeed-app-server-sar-role-binding";
pub const APP_SERVER_DEPLOYMENT_NAME: &str = "lightspeed-app-server";
pub const APP_SERVER_SERVICE_NAME: &str = "lightspeed-app-server";
pub const APP_SERVER_NETWORK_POLICY_NAME: &str = "lightspeed-app-server";
pub const APP_SERVER_CONTAINER_NAME: &str = "lightspeed-service-api";
pub const APP_SERVER_CONTAINER_PORT: i32 = 8443;
pub const APP_SERVER_SERVICE_MONITOR_NAME: &str = "lightspeed-app-server-monitor";
pub const APP_SERVER_PROMETHEUS_RULE_NAME: &str = "lightspeed-app-server-prometheus-rule";
pub const APP_SERVER_METRICS_PATH: &str = "/metrics";

/// Name of the app server configuration `ConfigMap`
pub const OLS_CONFIG_CM_NAME: &str = "olsconfig";
/// Key (and file name) of the configuration document inside the `ConfigMap`
pub const OLS_CONFIG_FILENAME: &str = "olsconfig.yaml";
pub const OLS_CONFIG_VOLUME_NAME: &str = "cm-olsconfig";
pub const OLS_CONFIG_MOUNT_PATH: &str = "/etc/ols";

/// Secret issued by the service CA when no user TLS secret is configured
pub const OLS_CERTS_SECRET_NAME: &str = "lightspeed-tls";

pub const DATA_COLLECTOR_CONTAINER_NAME: &str = "lightspeed-service-user-data-collector";
pub const OLS_USER_DATA_VOLUME_NAME: &str = "ols-user-data";
pub const OLS_USER_DATA_MOUNT_PATH: &str = "/app-root/ols-user-data";

pub const METRICS_READER_SECRET_NAME: &str = "metrics-reader-token";
pub const METRICS_READER_SERVICE_ACCOUNT_NAME: &str = "lightspeed-operator-metrics-reader";

// ============================================================================
// Mount Roots
// ============================================================================

pub const API_KEY_MOUNT_ROOT: &str = "/etc/apikeys";
pub const CREDENTIALS_MOUNT_ROOT: &str = "/etc/credentials";
pub const APP_CERTS_MOUNT_ROOT: &str = "/etc/certs";
pub const PASSWORD_FILE_NAME: &str = "password";
pub const TMP_VOLUME_NAME: &str = "tmp-writable-volume";
pub const TMP_VOLUME_MOUNT_PATH: &str = "/tmp";

/// Default file mode for secret and configmap volumes (0644)
pub const VOLUME_DEFAULT_MODE: i32 = 420;

// ============================================================================
// Certificates
// ============================================================================

/// Directory under the certs root holding `kube-root-ca.crt` entries
pub const APP_ADDITIONAL_CA_CERT_DIR: &str = "ols-additional-ca";
/// Directory under the certs root holding the user's additional CA entries
pub const USER_CA_CERT_DIR: &str = "ols-user-ca";
pub const OPENSHIFT_CA_VOLUME_NAME: &str = "openshift-ca";
pub const ADDITIONAL_CA_VOLUME_NAME: &str = "additional-ca";
pub const CERT_BUNDLE_VOLUME_NAME: &str = "cert-bundle";
pub const KUBE_ROOT_CA_CONFIGMAP_NAME: &str = "kube-root-ca.crt";
pub const PROXY_CA_CERT_FILE_NAME: &str = "proxy-ca.crt";
pub const PROXY_CA_VOLUME_NAME: &str = "proxy-ca";
pub const SERVICE_CA_CONFIGMAP_NAME: &str = "openshift-service-ca.crt";
pub const SERVICE_CA_CERT_FILE_NAME: &str = "service-ca.crt";

pub const TLS_KEY_FILE: &str = "tls.key";
pub const TLS_CERT_FILE: &str = "tls.crt";

// ============================================================================
// RAG
// ============================================================================

pub const RAG_VOLUME_NAME: &str = "rag";
pub const RAG_VOLUME_MOUNT_PATH: &str = "/rag-data";
pub const EMBEDDINGS_MODEL_PATH: &str = "/app-root/embeddings_model";
pub const OCP_DOCS_INDEX_ROOT: &str = "/app-root/vector_db/ocp_product_docs";

// ============================================================================
// OpenShift MCP Server (introspection sidecar)
// ============================================================================

pub const OPENSHIFT_MCP_SERVER_CONTAINER_NAME: &str = "openshift-mcp-server";
pub const OPENSHIFT_MCP_SERVER_PORT: i32 = 8080;
pub const OPENSHIFT_MCP_SERVER_TIMEOUT: u32 = 60;
pub const OPENSHIFT_MCP_SERVER_SSE_READ_TIMEOUT: u32 = 30;

// ============================================================================
// Content Hash Annotations
// ============================================================================

pub const OLS_CONFIG_HASH_KEY: &str = "hash/olsconfig";
pub const LLM_PROVIDER_HASH_KEY: &str = "hash/llmprovider";
pub const OLS_APP_TLS_HASH_KEY: &str = "hash/olstls";
pub const OLS_CONSOLE_TLS_HASH_KEY: &str = "hash/olsconsoletls";
pub const ADDITIONAL_CA_HASH_KEY: &str = "hash/additionalca";
pub const PROXY_CA_HASH_KEY: &str = "hash/proxyca";
pub const POSTGRES_CONFIG_HASH_KEY: &str = "hash/olspostgresconfig";
pub const POSTGRES_SECRET_HASH_KEY: &str = "hash/postgres-secret";
pub const REDIS_SECRET_HASH_KEY: &str = "hash/redis-secret";

// ============================================================================
// Watcher Protocol
// ============================================================================

/// Annotation placed on referenced secrets/configmaps naming the `OLSConfig` to requeue
pub const WATCHER_ANNOTATION_KEY: &str = "ols.openshift.io/watcher";

/// Annotation asking the service CA to issue a serving certificate into a secret
pub const SERVING_CERT_SECRET_ANNOTATION_KEY: &str =
    "service.beta.openshift.io/serving-cert-secret-name";

// ============================================================================
// LLM Providers
// ============================================================================

pub const AZURE_OPENAI_TYPE: &str = "azure_openai";
pub const API_TOKEN_KEY: &str = "apitoken";
pub const AZURE_CLIENT_ID_KEY: &str = "client_id";
pub const AZURE_TENANT_ID_KEY: &str = "tenant_id";
pub const AZURE_CLIENT_SECRET_KEY: &str = "client_secret";

// ============================================================================
// Telemetry
// ============================================================================

pub const TELEMETRY_PULL_SECRET_NAMESPACE: &str = "openshift-config";
pub const TELEMETRY_PULL_SECRET_NAME: &str = "pull-secret";
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
pub const TELEMETRY_AUTH_HOST: &str = "cloud.openshift.com";

// ============================================================================
// Postgres
// ============================================================================

pub const POSTGRES_DEPLOYMENT_NAME: &str = "lightspeed-postgres-server";
pub const POSTGRES_SERVICE_NAME: &str = "lightspeed-postgres-server";
pub const POSTGRES_NETWORK_POLICY_NAME: &str = "lightspeed-postgres-server";
pub const POSTGRES_SERVICE_PORT: i32 = 5432;
pub const POSTGRES_SECRET_NAME: &str = "lightspeed-postgres-secret";
pub const POSTGRES_CERTS_SECRET_NAME: &str = "lightspeed-postgres-certs";
pub const POSTGRES_CA_VOLUME: &str = "cm-olspostgresca";
pub const POSTGRES_BOOTSTRAP_SECRET_NAME: &str = "lightspeed-postgres-bootstrap";
pub const POSTGRES_EXTENSION_SCRIPT: &str = "create-extensions.sh";
pub const POSTGRES_BOOTSTRAP_MOUNT_PATH: &str =
    "/usr/share/container-scripts/postgresql/start/create-extensions.sh";
pub const POSTGRES_CONFIG_MAP_NAME: &str = "lightspeed-postgres-conf";
pub const POSTGRES_CONFIG_KEY: &str = "postgresql.conf.sample";
pub const POSTGRES_CONFIG_MOUNT_PATH: &str = "/usr/share/pgsql/postgresql.conf.sample";
pub const POSTGRES_DATA_VOLUME: &str = "postgres-data";
pub const POSTGRES_DATA_MOUNT_PATH: &str = "/var/lib/pgsql";
pub const POSTGRES_VAR_RUN_VOLUME: &str = "lightspeed-postgres-var-run";
pub const POSTGRES_VAR_RUN_MOUNT_PATH: &str = "/var/run/postgresql";
pub const POSTGRES_DEFAULT_USER: &str = "postgres";
pub const POSTGRES_DEFAULT_DB_NAME: &str = "postgres";
pub const POSTGRES_DEFAULT_SSL_MODE: &str = "require";
pub const POSTGRES_SHARED_BUFFERS: &str = "256MB";
pub const POSTGRES_MAX_CONNECTIONS: i32 = 2000;
pub const POSTGRES_PASSWORD_KEY: &str = "password";

pub const POSTGRES_CONFIG_CONTENT: &str = "
huge_pages = off
ssl = on
ssl_cert_file = '/etc/certs/tls.crt'
ssl_key_file = '/etc/certs/tls.key'
ssl_ca_file = '/etc/certs/cm-olspostgresca/service-ca.crt'
";

pub const POSTGRES_BOOTSTRAP_SCRIPT: &str = r#"#!/bin/bash

echo "attempting to create pg_trgm extension if it does not exist"

_psql () { psql --set ON_ERROR_STOP=1 "$@" ; }

echo "CREATE EXTENSION IF NOT EXISTS pg_trgm;" | _psql -d $POSTGRESQL_DATABASE
echo "CREATE SCHEMA IF NOT EXISTS quota;" | _psql -d $POSTGRESQL_DATABASE
"#;

// ============================================================================
// Redis
// ============================================================================

pub const REDIS_DEPLOYMENT_NAME: &str = "lightspeed-redis-server";
pub const REDIS_SERVICE_NAME: &str = "lightspeed-redis-server";
pub const REDIS_NETWORK_POLICY_NAME: &str = "lightspeed-redis-server";
pub const REDIS_SERVICE_PORT: i32 = 6379;
pub const REDIS_SECRET_NAME: &str = "lightspeed-redis-secret";
pub const REDIS_CERTS_SECRET_NAME: &str = "lightspeed-redis-certs";
pub const REDIS_CA_VOLUME: &str = "cm-olsredisca";
pub const REDIS_PASSWORD_KEY: &str = "password";
pub const REDIS_MAX_MEMORY: &str = "1024mb";
pub const REDIS_MAX_MEMORY_POLICY: &str = "allkeys-lru";
pub const REDIS_PASSWORD_ENV: &str = "REDIS_PASSWORD";

// ============================================================================
// Console UI Plugin
// ============================================================================

pub const CONSOLE_UI_CONFIGMAP_NAME: &str = "lightspeed-console-plugin";
pub const CONSOLE_UI_SERVICE_NAME: &str = "lightspeed-console-plugin";
pub const CONSOLE_UI_DEPLOYMENT_NAME: &str = "lightspeed-console-plugin";
pub const CONSOLE_UI_PLUGIN_NAME: &str = "lightspeed-console-plugin";
pub const CONSOLE_UI_NETWORK_POLICY_NAME: &str = "lightspeed-console-plugin";
pub const CONSOLE_UI_CONTAINER_NAME: &str = "lightspeed-console-plugin";
pub const CONSOLE_UI_SERVICE_CERT_SECRET_NAME: &str = "lightspeed-console-plugin-cert";
pub const CONSOLE_UI_HTTPS_PORT: i32 = 9443;
pub const CONSOLE_UI_PROXY_ALIAS: &str = "ols";
pub const CONSOLE_UI_DISPLAY_NAME: &str = "Lightspeed Console Plugin";
/// Name of the cluster-scoped `Console` operator config
pub const CONSOLE_CR_NAME: &str = "cluster";

pub const CONSOLE_NGINX_CONFIG: &str = "
pid       /tmp/nginx/nginx.pid;
error_log /dev/stdout info;
events {}
http {
  client_body_temp_path /tmp/nginx/client_body;
  proxy_temp_path       /tmp/nginx/proxy;
  fastcgi_temp_path     /tmp/nginx/fastcgi;
  uwsgi_temp_path       /tmp/nginx/uwsgi;
  scgi_temp_path        /tmp/nginx/scgi;
  access_log            /dev/stdout;
  include               /etc/nginx/mime.types;
  default_type          application/octet-stream;
  keepalive_timeout     65;
  server {
    listen              9443 ssl;
    listen              [::]:9443 ssl;
    ssl_certificate     /var/cert/tls.crt;
    ssl_certificate_key /var/cert/tls.key;
    root                /usr/share/nginx/html;
  }
}
";

// ============================================================================
// Deployment Status
// ============================================================================

/// Condition message while a managed deployment is rolling out
pub const DEPLOYMENT_IN_PROGRESS: &str = "In Progress";

// ============================================================================
// Timing
// ============================================================================

/// Requeue interval after a fully successful reconciliation (5 minutes)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Requeue interval while a deployment is still rolling out
pub const IN_PROGRESS_REQUEUE_SECS: u64 = 10;

/// Requeue interval after an error
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Poll interval while waiting for a TLS secret to appear
pub const DEFAULT_TLS_POLL_INTERVAL_MILLIS: u64 = 1_000;

/// Upper bound on waiting for a TLS secret to appear
pub const DEFAULT_TLS_WAIT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on a whole reconciliation pass
pub const DEFAULT_PASS_DEADLINE_SECS: u64 = 300;

/// Length in bytes of generated cache backend passwords (before base64)
pub const GENERATED_PASSWORD_BYTES: usize = 12;
