// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Content fingerprints used for change detection.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of a byte sequence. The
//! digest is stored in `hash/<subject>` annotations, so the algorithm and the
//! concatenation order of composite inputs are part of the persisted format:
//!
//! - TLS key pairs: `tls.key` bytes, then `tls.crt` bytes
//! - Map content (configmaps, CA bundles, secrets): for each key in sorted
//!   order, `key=value\n`
//! - Provider credentials: for each provider in declaration order, the map
//!   framing above
//!
//! # Example
//!
//! ```rust
//! use lightspeed_operator::fingerprint::fingerprint;
//!
//! let digest = fingerprint(b"olsconfig");
//! assert_eq!(digest.len(), 64);
//! assert_eq!(digest, fingerprint(b"olsconfig"));
//! ```

use k8s_openapi::ByteString;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Fingerprint of a single byte sequence.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a TLS key pair: key bytes followed by certificate bytes.
#[must_use]
pub fn key_pair_fingerprint(key: &[u8], cert: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(cert);
    format!("{:x}", hasher.finalize())
}

/// Feed one map entry as `key=value\n`, so entry boundaries are unambiguous.
fn update_entry(hasher: &mut Sha256, key: &str, value: &[u8]) {
    hasher.update(key.as_bytes());
    hasher.update(b"=");
    hasher.update(value);
    hasher.update(b"\n");
}

/// Fingerprint of string map content (e.g. a `ConfigMap`'s `data`).
///
/// `BTreeMap` iteration is sorted by key, which fixes the order.
#[must_use]
pub fn string_map_fingerprint(data: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        update_entry(&mut hasher, key, value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of binary map content (e.g. a `Secret`'s `data`).
#[must_use]
pub fn byte_map_fingerprint(data: &BTreeMap<String, ByteString>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        update_entry(&mut hasher, key, &value.0);
    }
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of every provider's credential secret.
///
/// `secrets` must be in provider declaration order; each entry's keys are
/// hashed in sorted order as `key=value\n`.
#[must_use]
pub fn credentials_fingerprint<'a, I>(secrets: I) -> String
where
    I: IntoIterator<Item = &'a BTreeMap<String, ByteString>>,
{
    let mut hasher = Sha256::new();
    for data in secrets {
        for (key, value) in data {
            update_entry(&mut hasher, key, &value.0);
        }
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod fingerprint_tests;
