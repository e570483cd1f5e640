// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `watchers.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::constants::{
        DEFAULT_NAMESPACE, KUBE_ROOT_CA_CONFIGMAP_NAME, TELEMETRY_PULL_SECRET_NAME,
        TELEMETRY_PULL_SECRET_NAMESPACE, WATCHER_ANNOTATION_KEY,
    };
    use crate::test_fixtures::{config_map, secret};
    use crate::watchers::{config_map_requests, secret_requests};

    fn names<K: kube::Resource<DynamicType = ()>>(
        refs: &[kube::runtime::reflector::ObjectRef<K>],
    ) -> Vec<String> {
        refs.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_annotated_secret_maps_to_its_watcher() {
        let mut credentials = secret("provider-token", &[]);
        credentials.metadata.annotations = Some(BTreeMap::from([(
            WATCHER_ANNOTATION_KEY.to_string(),
            "cluster".to_string(),
        )]));

        assert_eq!(names(&secret_requests(&credentials)), vec!["cluster"]);
    }

    #[test]
    fn test_unrelated_objects_map_to_nothing() {
        assert!(secret_requests(&secret("unrelated", &[])).is_empty());
        assert!(config_map_requests(&config_map("unrelated", &[]), DEFAULT_NAMESPACE).is_empty());
    }

    #[test]
    fn test_pull_secret_only_in_openshift_config() {
        let mut pull = secret(TELEMETRY_PULL_SECRET_NAME, &[]);
        assert!(secret_requests(&pull).is_empty());

        pull.metadata.namespace = Some(TELEMETRY_PULL_SECRET_NAMESPACE.to_string());
        assert_eq!(names(&secret_requests(&pull)), vec!["cluster"]);
    }

    #[test]
    fn test_root_ca_only_in_operator_namespace() {
        let mut root_ca = config_map(KUBE_ROOT_CA_CONFIGMAP_NAME, &[]);
        assert_eq!(
            names(&config_map_requests(&root_ca, DEFAULT_NAMESPACE)),
            vec!["cluster"]
        );

        root_ca.metadata.namespace = Some("default".to_string());
        assert!(config_map_requests(&root_ca, DEFAULT_NAMESPACE).is_empty());
    }
}
