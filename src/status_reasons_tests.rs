// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_reasons` module

#[cfg(test)]
mod tests {
    use crate::status_reasons::*;

    #[test]
    fn test_condition_types_are_stable() {
        assert_eq!(CONDITION_TYPE_API_READY, "ApiReady");
        assert_eq!(CONDITION_TYPE_CACHE_READY, "CacheReady");
        assert_eq!(CONDITION_TYPE_CONSOLE_PLUGIN_READY, "ConsolePluginReady");
        assert_eq!(CONDITION_TYPE_RECONCILED, "Reconciled");
    }

    #[test]
    fn test_failure_message_prefixes_error() {
        let message = failure_message(&"failed to reconcile OLS config map: boom");
        assert_eq!(
            message,
            "Failed: failed to reconcile OLS config map: boom"
        );
    }

    #[test]
    fn test_reason_is_camel_case() {
        assert!(REASON_RECONCILING
            .chars()
            .next()
            .is_some_and(char::is_uppercase));
        assert!(!REASON_RECONCILING.contains(' '));
    }
}
