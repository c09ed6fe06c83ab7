//! Structural decoding of the license token.
//!
//! The license is a compact JWS (`header.payload.signature`). Only the
//! payload's self-asserted claims are read: the signature segment is never
//! checked, so the subject recovered here is a label hint, not an
//! authenticated identity.

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LicenseFormatError {
    #[error("license is not a compact JWS: {0}")]
    Malformed(String),
    #[error("license {segment} segment is not valid base64url: {source}")]
    Base64 {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("license header cannot be decoded: {0}")]
    Header(#[source] serde_json::Error),
    #[error("license claims cannot be decoded: {0}")]
    Claims(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct JoseHeader {
    alg: String,
}

/// Registered claims the exporter cares about. Unknown claims are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LicenseClaims {
    #[serde(rename = "sub")]
    pub subject: Option<String>,
    #[serde(rename = "iss")]
    pub issuer: Option<String>,
    #[serde(rename = "exp")]
    pub expires_at: Option<i64>,
}

/// Decode the claims of `token` without verifying its signature.
pub fn decode_unverified(token: &str) -> Result<LicenseClaims, LicenseFormatError> {
    let token = token.trim();
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(LicenseFormatError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(LicenseFormatError::Malformed("empty segment".to_string()));
    }

    let header_bytes = decode_segment(segments[0], "header")?;
    let header: JoseHeader =
        serde_json::from_slice(&header_bytes).map_err(LicenseFormatError::Header)?;
    if header.alg.is_empty() {
        return Err(LicenseFormatError::Malformed(
            "header has an empty alg".to_string(),
        ));
    }

    let payload = decode_segment(segments[1], "payload")?;
    let claims: LicenseClaims =
        serde_json::from_slice(&payload).map_err(LicenseFormatError::Claims)?;

    Ok(claims)
}

/// Decode the token and return its subject, empty when the claims carry none.
pub fn subject_unverified(token: &str) -> Result<String, LicenseFormatError> {
    Ok(decode_unverified(token)?.subject.unwrap_or_default())
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, LicenseFormatError> {
    // Tokens are unpadded per RFC 7515, but tolerate issuers that pad anyway.
    let result = if segment.ends_with('=') {
        URL_SAFE.decode(segment)
    } else {
        URL_SAFE_NO_PAD.decode(segment)
    };
    result.map_err(|source| LicenseFormatError::Base64 {
        segment: name,
        source,
    })
}
