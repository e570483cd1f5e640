// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store/memory.rs`

#[cfg(test)]
mod tests {
    use crate::store::memory::{MemoryStore, Verb};
    use crate::store::{is_not_found, ObjectStore};
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn config_map(name: &str, labels: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get_assigns_metadata() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("a", &[])).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());

        let fetched: Option<ConfigMap> = store.get(Some("ns"), "a").await.unwrap();
        assert_eq!(fetched.unwrap().data, created.data);
        assert_eq!(store.writes::<ConfigMap>(Verb::Create), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let store = MemoryStore::new();
        store.create(&config_map("a", &[])).await.unwrap();
        let err = store.create(&config_map("a", &[])).await.unwrap_err();
        assert!(matches!(err, kube::Error::Api(ref r) if r.code == 409));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update(&config_map("a", &[])).await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("a", &[])).await.unwrap();
        store.update(&created).await.unwrap();
        let err = store.update(&created).await.unwrap_err();
        assert!(matches!(err, kube::Error::Api(ref r) if r.code == 409));
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_labels() {
        let store = MemoryStore::new();
        store.put(&config_map("a", &[("app", "x")])).unwrap();
        store.put(&config_map("b", &[("app", "y")])).unwrap();

        let all: Vec<ConfigMap> = store.list(Some("ns"), None).await.unwrap();
        assert_eq!(all.len(), 2);
        let selected: Vec<ConfigMap> = store.list(Some("ns"), Some("app=x")).await.unwrap();
        assert_eq!(selected.len(), 1);
        let other_ns: Vec<ConfigMap> = store.list(Some("other"), None).await.unwrap();
        assert!(other_ns.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_success_and_not_counted() {
        let store = MemoryStore::new();
        store.delete::<ConfigMap>(Some("ns"), "a").await.unwrap();
        assert_eq!(store.writes::<ConfigMap>(Verb::Delete), 0);
    }

    #[tokio::test]
    async fn test_update_keeps_existing_status() {
        let store = MemoryStore::new();
        let mut deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("d".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec::default()),
            status: Some(DeploymentStatus {
                ready_replicas: Some(1),
                ..Default::default()
            }),
        };
        let stored = store.put(&deployment).unwrap();
        deployment.metadata = stored.metadata;
        deployment.status = None;
        let updated = store.update(&deployment).await.unwrap();
        assert_eq!(updated.status.and_then(|s| s.ready_replicas), Some(1));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_on::<ConfigMap>(Verb::Create);
        let err = store.create(&config_map("a", &[])).await.unwrap_err();
        assert!(matches!(err, kube::Error::Api(ref r) if r.code == 500));
        assert_eq!(store.count::<ConfigMap>(), 0);

        store.clear_failures();
        store.create(&config_map("a", &[])).await.unwrap();
        assert_eq!(store.count::<ConfigMap>(), 1);
    }
}
