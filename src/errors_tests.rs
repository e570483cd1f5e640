// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use crate::errors::{CertificateError, ErrorKind, OperatorError};
    use std::time::Duration;

    fn not_found() -> kube::Error {
        kube::Error::Api(
            kube::core::Status::failure("secrets \"x\" not found", "NotFound")
                .with_code(404)
                .boxed(),
        )
    }

    #[test]
    fn test_task_wrapper_prefixes_step_name() {
        let err = OperatorError::missing("configmap", "olsconfig").in_task("reconcile OLS config map");
        assert_eq!(
            err.to_string(),
            "failed to reconcile OLS config map: configmap olsconfig not found"
        );
        assert_eq!(err.task_name(), Some("reconcile OLS config map"));
    }

    #[test]
    fn test_root_kind_looks_through_nested_tasks() {
        let err = OperatorError::missing("secret", "creds")
            .in_task("inner step")
            .in_task("outer step");
        assert_eq!(err.kind(), ErrorKind::Task);
        assert_eq!(err.root_kind(), ErrorKind::MissingDependency);
    }

    #[test]
    fn test_certificate_validation_message() {
        let err = OperatorError::CertificateValidation {
            subject: "additional CA",
            name: "ca.crt".to_string(),
            source: CertificateError::NoCertificate,
        };
        assert_eq!(
            err.to_string(),
            "failed to validate additional CA certificate ca.crt: no PEM encoded certificate found"
        );
    }

    #[test]
    fn test_store_errors_are_transient() {
        let err = OperatorError::from(not_found()).in_task("reconcile service");
        assert!(err.is_transient());
        assert_eq!(err.root_kind(), ErrorKind::Store);
    }

    #[test]
    fn test_deadline_is_transient_but_generation_is_not() {
        let deadline = OperatorError::DeadlineExceeded {
            what: "secret lightspeed-tls".to_string(),
            elapsed: Duration::from_secs(60),
        };
        assert!(deadline.is_transient());

        let generation = OperatorError::generation("OLS config file", "bad yaml");
        assert!(!generation.is_transient());
        assert_eq!(
            generation.to_string(),
            "failed to generate OLS config file: bad yaml"
        );
    }

    #[test]
    fn test_invalid_resource_message() {
        let err = OperatorError::invalid("secret", "llm-creds", "missing key apitoken");
        assert_eq!(
            err.to_string(),
            "secret llm-creds is invalid: missing key apitoken"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidResource);
    }
}
