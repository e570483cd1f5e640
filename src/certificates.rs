// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PEM / X.509 validation of CA material referenced by `OLSConfig`.

use crate::errors::CertificateError;
use x509_parser::prelude::*;

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Validate a PEM bundle holding one or more CA certificates.
///
/// Every PEM block must be a `CERTIFICATE` whose body parses as X.509 DER.
/// Returns the number of certificates in the bundle.
///
/// # Errors
///
/// Returns a [`CertificateError`] when the payload holds no PEM block, holds a
/// non-certificate block, or a certificate body fails to parse.
pub fn validate_ca_bundle(data: &[u8]) -> Result<usize, CertificateError> {
    let blocks = ::pem::parse_many(data)?;
    if blocks.is_empty() {
        return Err(CertificateError::NoCertificate);
    }

    for block in &blocks {
        if block.tag() != CERTIFICATE_TAG {
            return Err(CertificateError::UnexpectedBlock {
                tag: block.tag().to_string(),
            });
        }
        X509Certificate::from_der(block.contents()).map_err(|e| CertificateError::X509 {
            reason: e.to_string(),
        })?;
    }

    Ok(blocks.len())
}

#[cfg(test)]
#[path = "certificates_tests.rs"]
mod certificates_tests;
