// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store/mod.rs`

#[cfg(test)]
mod tests {
    use crate::store::{api_error, is_not_found};

    #[test]
    fn test_is_not_found_only_matches_404() {
        assert!(is_not_found(&api_error(404, "NotFound", "gone".to_string())));
        assert!(!is_not_found(&api_error(409, "Conflict", "stale".to_string())));
        assert!(!is_not_found(&api_error(500, "InternalError", "boom".to_string())));
    }
}
