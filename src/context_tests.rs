// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`

#[cfg(test)]
mod tests {
    use crate::context::OcpVersion;
    use crate::errors::ErrorKind;
    use crate::test_fixtures::pass_input;

    #[test]
    fn test_version_parse_drops_patch() {
        let version = OcpVersion::parse("4.16.3").unwrap();
        assert_eq!(version.major, "4");
        assert_eq!(version.minor, "16");
        assert_eq!(version.to_string(), "4.16");
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        for bad in ["", "4", "four.sixteen", "4."] {
            let err = OcpVersion::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidResource, "{bad}");
        }
    }

    #[test]
    fn test_data_collector_requires_telemetry() {
        let mut input = pass_input();
        input.telemetry_enabled = false;
        assert!(!input.data_collector_enabled());

        input.telemetry_enabled = true;
        assert!(input.data_collector_enabled());
    }

    #[test]
    fn test_data_collector_off_when_everything_disabled() {
        let mut input = pass_input();
        input.telemetry_enabled = true;
        input.cr.spec.ols.user_data_collection.feedback_disabled = true;
        input.cr.spec.ols.user_data_collection.transcripts_disabled = true;
        assert!(!input.data_collector_enabled());

        input.cr.spec.ols.user_data_collection.transcripts_disabled = false;
        assert!(input.data_collector_enabled());
    }
}
