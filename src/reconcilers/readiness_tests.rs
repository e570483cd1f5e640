// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `readiness.rs`

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::{
        Deployment, DeploymentCondition, DeploymentSpec, DeploymentStatus,
    };
    use kube::api::ObjectMeta;

    use crate::constants::DEFAULT_NAMESPACE;
    use crate::reconcilers::readiness::{check_deployment, deployment_readiness, Readiness};
    use crate::store::MemoryStore;

    fn condition(type_: &str, status: &str, message: &str) -> DeploymentCondition {
        DeploymentCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn deployment(
        replicas: Option<i32>,
        ready: Option<i32>,
        conditions: Vec<DeploymentCondition>,
    ) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("lightspeed-app-server".to_string()),
                namespace: Some(DEFAULT_NAMESPACE.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas,
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: ready,
                conditions: Some(conditions),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_available_with_all_replicas_is_ready() {
        let dep = deployment(Some(2), Some(2), vec![condition("Available", "True", "ok")]);
        assert_eq!(deployment_readiness(&dep), Readiness::Ready);
    }

    #[test]
    fn test_replicas_default_to_one() {
        let dep = deployment(None, Some(1), vec![condition("Available", "True", "ok")]);
        assert_eq!(deployment_readiness(&dep), Readiness::Ready);
    }

    #[test]
    fn test_partial_rollout_is_in_progress() {
        let dep = deployment(Some(2), Some(1), vec![condition("Available", "True", "ok")]);
        assert_eq!(deployment_readiness(&dep), Readiness::InProgress);

        let dep = deployment(Some(1), Some(1), vec![condition("Available", "False", "no")]);
        assert_eq!(deployment_readiness(&dep), Readiness::InProgress);
    }

    #[test]
    fn test_replica_failure_wins() {
        let dep = deployment(
            Some(1),
            Some(1),
            vec![
                condition("Available", "True", "ok"),
                condition("ReplicaFailure", "True", "quota exceeded"),
            ],
        );
        assert_eq!(
            deployment_readiness(&dep),
            Readiness::Failed("quota exceeded".to_string())
        );
    }

    #[tokio::test]
    async fn test_absent_deployment_is_in_progress() {
        let store = MemoryStore::new();
        let readiness = check_deployment(&store, DEFAULT_NAMESPACE, "lightspeed-app-server")
            .await
            .unwrap();
        assert_eq!(readiness, Readiness::InProgress);

        store
            .put(&deployment(Some(1), Some(1), vec![condition("Available", "True", "ok")]))
            .unwrap();
        let readiness = check_deployment(&store, DEFAULT_NAMESPACE, "lightspeed-app-server")
            .await
            .unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }
}
