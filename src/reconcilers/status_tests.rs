// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{OLSConfig, OLSConfigStatus};
    use crate::reconcilers::status::{
        conditions_equal, create_condition, find_condition, set_condition, write_status,
    };
    use crate::status_reasons::{
        CONDITION_TYPE_API_READY, CONDITION_TYPE_CACHE_READY, REASON_RECONCILING, STATUS_FALSE,
        STATUS_TRUE,
    };
    use crate::store::{MemoryStore, Verb};
    use crate::test_fixtures::ols_config;

    #[test]
    fn test_create_condition() {
        let condition = create_condition(CONDITION_TYPE_API_READY, STATUS_TRUE, REASON_RECONCILING, "ok");
        assert_eq!(condition.r#type, "ApiReady");
        assert_eq!(condition.reason.as_deref(), Some("Reconciling"));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let mut conditions = vec![create_condition(
            CONDITION_TYPE_API_READY,
            STATUS_FALSE,
            REASON_RECONCILING,
            "In Progress",
        )];
        conditions[0].last_transition_time = Some("2025-01-01T00:00:00Z".to_string());

        set_condition(&mut conditions, CONDITION_TYPE_API_READY, STATUS_FALSE, REASON_RECONCILING, "Failed: x");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].message.as_deref(), Some("Failed: x"));

        set_condition(&mut conditions, CONDITION_TYPE_API_READY, STATUS_TRUE, REASON_RECONCILING, "ok");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_set_condition_appends_new_type() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, CONDITION_TYPE_CACHE_READY, STATUS_TRUE, REASON_RECONCILING, "ok");
        assert!(find_condition(&conditions, CONDITION_TYPE_CACHE_READY).is_some());
        assert!(find_condition(&conditions, CONDITION_TYPE_API_READY).is_none());
    }

    #[test]
    fn test_conditions_equal_ignores_time_and_order() {
        let a = create_condition(CONDITION_TYPE_API_READY, STATUS_TRUE, REASON_RECONCILING, "ok");
        let b = create_condition(CONDITION_TYPE_CACHE_READY, STATUS_TRUE, REASON_RECONCILING, "ok");
        let mut a_later = a.clone();
        a_later.last_transition_time = Some("later".to_string());

        assert!(conditions_equal(&[a.clone(), b.clone()], &[b.clone(), a_later]));
        assert!(!conditions_equal(&[a.clone()], &[a.clone(), b.clone()]));

        let mut failed = a.clone();
        failed.status = STATUS_FALSE.to_string();
        assert!(!conditions_equal(&[a], &[failed]));
    }

    #[tokio::test]
    async fn test_write_status_skips_unchanged_conditions() {
        let store = MemoryStore::new();
        let cr = store.put(&ols_config()).unwrap();
        let conditions = vec![create_condition(
            CONDITION_TYPE_API_READY,
            STATUS_TRUE,
            REASON_RECONCILING,
            "ok",
        )];

        assert!(write_status(&store, &cr, conditions.clone()).await.unwrap());
        let stored: OLSConfig = store.fetch(None, "cluster").unwrap();
        assert_eq!(
            stored.status.as_ref().map(|s| s.conditions.len()),
            Some(1)
        );

        assert!(!write_status(&store, &stored, conditions).await.unwrap());
        assert_eq!(store.writes::<OLSConfig>(Verb::UpdateStatus), 1);
    }

    #[tokio::test]
    async fn test_write_status_replaces_changed_conditions() {
        let store = MemoryStore::new();
        let mut cr = ols_config();
        cr.status = Some(OLSConfigStatus {
            conditions: vec![create_condition(
                CONDITION_TYPE_API_READY,
                STATUS_FALSE,
                REASON_RECONCILING,
                "In Progress",
            )],
        });
        let cr = store.put(&cr).unwrap();

        let conditions = vec![create_condition(
            CONDITION_TYPE_API_READY,
            STATUS_TRUE,
            REASON_RECONCILING,
            "ok",
        )];
        assert!(write_status(&store, &cr, conditions).await.unwrap());
        let stored: OLSConfig = store.fetch(None, "cluster").unwrap();
        assert_eq!(stored.status.unwrap().conditions[0].status, "True");
    }
}
