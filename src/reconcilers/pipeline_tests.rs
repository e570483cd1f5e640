// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `pipeline.rs`

#[cfg(test)]
mod tests {
    use crate::context::{Context, PassInput};
    use crate::errors::{ErrorKind, OperatorError};
    use crate::reconcilers::pipeline::{run_pipeline, ReconcileTask, TaskFuture};
    use crate::state_cache::StateCache;
    use crate::store::MemoryStore;
    use crate::test_fixtures::{pass_input, test_context};

    fn write_config<'a>(
        _ctx: &'a Context<MemoryStore>,
        _input: &'a PassInput,
        cache: &'a mut StateCache,
    ) -> TaskFuture<'a> {
        Box::pin(async move {
            cache.app_config = Some("config".to_string());
            Ok(())
        })
    }

    fn read_config<'a>(
        _ctx: &'a Context<MemoryStore>,
        _input: &'a PassInput,
        cache: &'a mut StateCache,
    ) -> TaskFuture<'a> {
        Box::pin(async move {
            let config = cache
                .app_config
                .clone()
                .ok_or_else(|| OperatorError::missing("fingerprint", "olsconfig"))?;
            cache.app_tls = Some(format!("{config}-tls"));
            Ok(())
        })
    }

    fn fail<'a>(
        _ctx: &'a Context<MemoryStore>,
        _input: &'a PassInput,
        _cache: &'a mut StateCache,
    ) -> TaskFuture<'a> {
        Box::pin(async move { Err(OperatorError::missing("Secret", "test-secret")) })
    }

    #[tokio::test]
    async fn test_tasks_share_the_state_cache_in_order() {
        let ctx = test_context();
        let mut cache = StateCache::new();
        let tasks = [
            ReconcileTask::new("write config", write_config),
            ReconcileTask::new("read config", read_config),
        ];

        run_pipeline(&tasks, &ctx, &pass_input(), &mut cache)
            .await
            .unwrap();

        assert_eq!(cache.app_tls.as_deref(), Some("config-tls"));
    }

    #[tokio::test]
    async fn test_order_is_load_bearing() {
        let ctx = test_context();
        let mut cache = StateCache::new();
        let tasks = [
            ReconcileTask::new("read config", read_config),
            ReconcileTask::new("write config", write_config),
        ];

        let err = run_pipeline(&tasks, &ctx, &pass_input(), &mut cache)
            .await
            .unwrap_err();

        assert_eq!(err.task_name(), Some("read config"));
        assert_eq!(cache.app_config, None);
    }

    #[tokio::test]
    async fn test_first_failure_stops_and_names_the_task() {
        let ctx = test_context();
        let mut cache = StateCache::new();
        let tasks = [
            ReconcileTask::new("write config", write_config),
            ReconcileTask::new("check credentials", fail),
            ReconcileTask::new("read config", read_config),
        ];

        let err = run_pipeline(&tasks, &ctx, &pass_input(), &mut cache)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Task);
        assert_eq!(err.root_kind(), ErrorKind::MissingDependency);
        assert_eq!(
            err.to_string(),
            "failed to check credentials: Secret test-secret not found"
        );
        // Earlier effects stay, later tasks never ran.
        assert_eq!(cache.app_config.as_deref(), Some("config"));
        assert_eq!(cache.app_tls, None);
    }
}
