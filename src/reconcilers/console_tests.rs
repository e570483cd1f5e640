// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `console.rs`

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::Deployment;

    use crate::constants::{
        CONSOLE_CR_NAME, CONSOLE_UI_DEPLOYMENT_NAME, CONSOLE_UI_PLUGIN_NAME, DEFAULT_NAMESPACE,
        OLS_CONSOLE_TLS_HASH_KEY,
    };
    use crate::errors::ErrorKind;
    use crate::external_types::{Console, ConsolePlugin};
    use crate::reconcilers::console::{
        activate_console_plugin, deactivate_console_plugin, reconcile_console,
    };
    use crate::state_cache::StateCache;
    use crate::store::{MemoryStore, Verb};
    use crate::test_fixtures::{console, pass_input, seed_dependencies, test_context};

    fn plugins(store: &MemoryStore) -> Vec<String> {
        store
            .fetch::<Console>(None, CONSOLE_CR_NAME)
            .unwrap()
            .spec
            .plugins
    }

    #[tokio::test]
    async fn test_pipeline_registers_and_activates_plugin() {
        let ctx = test_context();
        seed_dependencies(&ctx.store);
        ctx.store.put(&console(&["monitoring-plugin"])).unwrap();
        let mut cache = StateCache::new();

        reconcile_console(&ctx, &pass_input(), &mut cache)
            .await
            .unwrap();

        assert_eq!(ctx.store.count::<ConsolePlugin>(), 1);
        assert_eq!(
            plugins(&ctx.store),
            vec!["monitoring-plugin".to_string(), CONSOLE_UI_PLUGIN_NAME.to_string()]
        );
        let deployment: Deployment = ctx
            .store
            .fetch(Some(DEFAULT_NAMESPACE), CONSOLE_UI_DEPLOYMENT_NAME)
            .unwrap();
        let annotations = deployment
            .spec
            .and_then(|s| s.template.metadata)
            .and_then(|m| m.annotations)
            .unwrap();
        assert_eq!(
            annotations.get(OLS_CONSOLE_TLS_HASH_KEY),
            cache.console_tls.as_ref()
        );
    }

    #[tokio::test]
    async fn test_activation_keeps_console_operator_fields() {
        let store = MemoryStore::new();
        store.put(&console(&[])).unwrap();

        assert!(activate_console_plugin(&store).await.unwrap());
        assert!(!activate_console_plugin(&store).await.unwrap());

        let live: Console = store.fetch(None, CONSOLE_CR_NAME).unwrap();
        assert_eq!(live.spec.plugins, vec![CONSOLE_UI_PLUGIN_NAME.to_string()]);
        assert_eq!(
            live.spec.rest.get("managementState"),
            Some(&serde_json::json!("Managed"))
        );
        assert_eq!(store.writes::<Console>(Verb::Update), 1);
    }

    #[tokio::test]
    async fn test_missing_console_fails_activation() {
        let ctx = test_context();
        seed_dependencies(&ctx.store);

        let err = reconcile_console(&ctx, &pass_input(), &mut StateCache::new())
            .await
            .unwrap_err();

        assert_eq!(err.task_name(), Some("activate console plugin"));
        assert_eq!(err.root_kind(), ErrorKind::MissingDependency);
        assert!(err.to_string().contains("Console cluster not found"));
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let ctx = test_context();
        seed_dependencies(&ctx.store);
        ctx.store.put(&console(&[])).unwrap();
        reconcile_console(&ctx, &pass_input(), &mut StateCache::new())
            .await
            .unwrap();
        ctx.store.reset_counts();

        reconcile_console(&ctx, &pass_input(), &mut StateCache::new())
            .await
            .unwrap();

        assert_eq!(ctx.store.total_writes(Verb::Create), 0);
        assert_eq!(ctx.store.total_writes(Verb::Update), 0);
    }

    #[tokio::test]
    async fn test_deactivation_removes_plugin_and_registration() {
        let ctx = test_context();
        seed_dependencies(&ctx.store);
        ctx.store.put(&console(&["monitoring-plugin"])).unwrap();
        reconcile_console(&ctx, &pass_input(), &mut StateCache::new())
            .await
            .unwrap();

        deactivate_console_plugin(&ctx.store).await.unwrap();

        assert_eq!(plugins(&ctx.store), vec!["monitoring-plugin".to_string()]);
        assert_eq!(ctx.store.count::<ConsolePlugin>(), 0);

        // Nothing left to do the second time.
        ctx.store.reset_counts();
        deactivate_console_plugin(&ctx.store).await.unwrap();
        assert_eq!(ctx.store.total_writes(Verb::Update), 0);
        assert_eq!(ctx.store.total_writes(Verb::Delete), 0);
    }
}
