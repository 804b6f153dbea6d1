//! Request signing check for Slack's `v0` scheme.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const DEFAULT_MAX_SKEW_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing X-Slack-Request-Timestamp header")]
    MissingTimestamp,
    #[error("malformed request timestamp `{0}`")]
    MalformedTimestamp(String),
    #[error("request timestamp is {skew_secs}s away from now")]
    StaleTimestamp { skew_secs: i64 },
    #[error("missing X-Slack-Signature header")]
    MissingSignature,
    #[error("signature does not match request body")]
    Mismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// No signing secret is configured.
    Skipped,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<SecretString>,
    max_skew_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: Option<SecretString>, max_skew_secs: i64) -> Self {
        Self { secret, max_skew_secs }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks freshness first, then the HMAC over `v0:<timestamp>:<body>`.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now_unix: i64,
    ) -> Result<Verification, SignatureError> {
        let Some(secret) = &self.secret else {
            return Ok(Verification::Skipped);
        };

        let timestamp = timestamp.map(str::trim).ok_or(SignatureError::MissingTimestamp)?;
        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::MalformedTimestamp(timestamp.to_string()))?;
        let skew_secs = (now_unix - sent_at).abs();
        if skew_secs > self.max_skew_secs {
            return Err(SignatureError::StaleTimestamp { skew_secs });
        }

        let provided = signature.map(str::trim).ok_or(SignatureError::MissingSignature)?;
        let provided = provided
            .strip_prefix("v0=")
            .and_then(decode_hex)
            .ok_or(SignatureError::Mismatch)?;

        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(signing_base(timestamp, body).as_slice());
        mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)?;
        Ok(Verification::Verified)
    }
}

fn signing_base(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut base = Vec::with_capacity(body.len() + timestamp.len() + 4);
    base.extend_from_slice(b"v0:");
    base.extend_from_slice(timestamp.as_bytes());
    base.push(b':');
    base.extend_from_slice(body);
    base
}

/// Produces the `v0=<hex>` header value for a body. Used by tests and the CLI doctor.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(signing_base(timestamp, body).as_slice());
    format!("v0={}", encode_hex(mac.finalize().into_bytes().as_slice()))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }
    value
        .as_bytes()
        .chunks(2)
        .map(|pair| Some((hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?))
        .collect()
}

fn hex_nibble(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{sign, SignatureError, SignatureVerifier, Verification};

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = b"command=%2Fdashboard&user_id=U1&text=";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(Some(SecretString::from("8f742231b10e8888abcd99yyyzzz85a5")), 300)
    }

    #[test]
    fn accepts_correct_signature() {
        let signature = sign("8f742231b10e8888abcd99yyyzzz85a5", "1700000000", BODY);
        let result = verifier().verify(Some("1700000000"), Some(&signature), BODY, NOW + 10);
        assert_eq!(result, Ok(Verification::Verified));
    }

    #[test]
    fn rejects_signature_over_different_body_or_secret() {
        let tampered = sign("8f742231b10e8888abcd99yyyzzz85a5", "1700000000", b"user_id=U2");
        assert_eq!(
            verifier().verify(Some("1700000000"), Some(&tampered), BODY, NOW),
            Err(SignatureError::Mismatch)
        );

        let wrong_secret = sign("other-secret", "1700000000", BODY);
        assert_eq!(
            verifier().verify(Some("1700000000"), Some(&wrong_secret), BODY, NOW),
            Err(SignatureError::Mismatch)
        );

        assert_eq!(
            verifier().verify(Some("1700000000"), Some("v0=zz"), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected_even_with_valid_signature() {
        let sent = (NOW - 301).to_string();
        let signature = sign("8f742231b10e8888abcd99yyyzzz85a5", &sent, BODY);
        assert_eq!(
            verifier().verify(Some(&sent), Some(&signature), BODY, NOW),
            Err(SignatureError::StaleTimestamp { skew_secs: 301 })
        );

        let future = (NOW + 400).to_string();
        assert!(matches!(
            verifier().verify(Some(&future), Some("v0=00"), BODY, NOW),
            Err(SignatureError::StaleTimestamp { .. })
        ));
    }

    #[test]
    fn missing_or_malformed_headers_are_rejected() {
        assert_eq!(
            verifier().verify(None, Some("v0=00"), BODY, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verifier().verify(Some("yesterday"), Some("v0=00"), BODY, NOW),
            Err(SignatureError::MalformedTimestamp("yesterday".to_string()))
        );
        assert_eq!(
            verifier().verify(Some("1700000000"), None, BODY, NOW),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn verification_is_skipped_without_secret() {
        let open = SignatureVerifier::new(None, 300);
        assert!(!open.is_enabled());
        assert_eq!(open.verify(None, None, BODY, NOW), Ok(Verification::Skipped));
    }
}
