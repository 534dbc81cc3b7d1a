//! HMAC signature validation for inbound webhook requests.
//!
//! The signature is always recomputed over the raw body bytes; the header
//! value may carry a `sha256=`-style algorithm prefix, which is tolerated.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use conduit_core::{ConnectorError, ConnectorResult};

/// Supported signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl HmacAlgorithm {
    pub fn parse(name: &str) -> ConnectorResult<Self> {
        match name.to_lowercase().as_str() {
            "sha1" | "hmac_sha1" => Ok(HmacAlgorithm::Sha1),
            "sha256" | "hmac_sha256" => Ok(HmacAlgorithm::Sha256),
            "sha512" | "hmac_sha512" => Ok(HmacAlgorithm::Sha512),
            other => Err(ConnectorError::AuthenticationFailure(format!(
                "unsupported HMAC algorithm '{}'",
                other
            ))),
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            HmacAlgorithm::Sha1 => "sha1=",
            HmacAlgorithm::Sha256 => "sha256=",
            HmacAlgorithm::Sha512 => "sha512=",
        }
    }
}

/// Compute the hex-encoded signature for a body. Exposed for tests and
/// outbound tooling.
pub fn sign(algorithm: HmacAlgorithm, secret: &[u8], body: &[u8]) -> ConnectorResult<String> {
    let invalid_key = |_| ConnectorError::AuthenticationFailure("invalid HMAC secret".to_string());
    let bytes = match algorithm {
        HmacAlgorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hex::encode(bytes))
}

/// Validate the signature header of a request against the recomputed HMAC
/// of its raw body. A missing or malformed header is a plain mismatch, not
/// an error; misconfiguration (bad secret, unknown algorithm) is an error.
pub fn is_request_valid(
    body: &[u8],
    headers: &HashMap<String, String>,
    signature_header: &str,
    secret: &str,
    algorithm: HmacAlgorithm,
) -> ConnectorResult<bool> {
    let Some(provided) = header_value(headers, signature_header) else {
        return Ok(false);
    };
    let provided = provided
        .strip_prefix(algorithm.prefix())
        .unwrap_or(provided);
    let Ok(provided_bytes) = hex::decode(provided) else {
        return Ok(false);
    };
    let expected = sign(algorithm, secret.as_bytes(), body)?;
    // Compare decoded bytes so casing of the hex header does not matter
    let expected_bytes = hex::decode(&expected)
        .map_err(|e| ConnectorError::AuthenticationFailure(e.to_string()))?;
    Ok(constant_time_eq(&expected_bytes, &provided_bytes))
}

fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
