// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `options.rs`

#[cfg(test)]
mod tests {
    use crate::options::{Args, OperatorOptions};
    use clap::Parser;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["lightspeed-operator"]).unwrap();
        let options = OperatorOptions::from_args_with_env(args, |_| None);
        assert_eq!(options.reconcile_interval, Duration::from_secs(300));
        assert_eq!(options.tls_wait_timeout, Duration::from_secs(60));
        assert_eq!(options.metrics_bind_address.port(), 8080);
        assert!(options.proxy_env.is_empty());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "lightspeed-operator",
            "--namespace",
            "lightspeed",
            "--cluster-version",
            "4.16",
            "--reconcile-interval",
            "60",
        ])
        .unwrap();
        let options = OperatorOptions::from_args_with_env(args, |_| None);
        assert_eq!(options.namespace, "lightspeed");
        assert_eq!(options.cluster_version_override.as_deref(), Some("4.16"));
        assert_eq!(options.reconcile_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_proxy_env_is_captured_in_fixed_order() {
        let env = HashMap::from([
            ("no_proxy", "localhost"),
            ("HTTPS_PROXY", "https://proxy:3128"),
            ("HTTP_PROXY", ""),
        ]);
        let args = Args::try_parse_from(["lightspeed-operator"]).unwrap();
        let options = OperatorOptions::from_args_with_env(args, |name| {
            env.get(name).map(|v| (*v).to_string())
        });
        assert_eq!(
            options.proxy_env,
            vec![
                ("HTTPS_PROXY".to_string(), "https://proxy:3128".to_string()),
                ("no_proxy".to_string(), "localhost".to_string()),
            ]
        );
    }
}
