//! Webhook signature verification.
//!
//! The processor signs each delivery with hex SHA-256 over
//! `{secret}.{timestamp}.{body}` and sends the digest and timestamp in
//! headers. Verification compares in constant time and bounds the
//! timestamp skew so captured deliveries cannot be replayed later.

use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

/// Why a webhook delivery was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The timestamp header is not a unix epoch integer.
    #[error("malformed timestamp")]
    MalformedTimestamp,
    /// The timestamp is outside the accepted skew window.
    #[error("timestamp outside tolerance")]
    StaleTimestamp,
    /// The digest does not match the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the expected hex digest for a delivery.
#[must_use]
pub fn expected_signature(secret: &str, timestamp: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(timestamp.as_bytes());
    hasher.update(b".");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a delivery's signature and timestamp.
///
/// `now` is the receiver's unix time; `tolerance` the accepted skew in
/// seconds on either side.
///
/// # Errors
///
/// Returns the specific [`SignatureError`]; callers reject the delivery
/// with 401 in every case.
pub fn verify(
    secret: &str,
    timestamp: &str,
    body: &str,
    provided: &str,
    now: i64,
    tolerance: u64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;
    let skew = (now - ts).unsigned_abs();
    if skew > tolerance {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = expected_signature(secret, timestamp, body);
    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &str = r#"{"type":"payment.succeeded","data":{"payment_ref":"pay_1"}}"#;

    #[test]
    fn valid_signature_passes() {
        let signature = expected_signature(SECRET, "1000", BODY);
        assert_eq!(verify(SECRET, "1000", BODY, &signature, 1000, 300), Ok(()));
    }

    #[test]
    fn skew_inside_tolerance_passes_either_direction() {
        let signature = expected_signature(SECRET, "1000", BODY);
        assert_eq!(verify(SECRET, "1000", BODY, &signature, 1299, 300), Ok(()));
        assert_eq!(verify(SECRET, "1000", BODY, &signature, 701, 300), Ok(()));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let signature = expected_signature(SECRET, "1000", BODY);
        assert_eq!(
            verify(SECRET, "1000", BODY, &signature, 1301, 300),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = expected_signature(SECRET, "1000", BODY);
        assert_eq!(
            verify(SECRET, "1000", "{}", &signature, 1000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signature = expected_signature("whsec_other", "1000", BODY);
        assert_eq!(
            verify(SECRET, "1000", BODY, &signature, 1000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let signature = expected_signature(SECRET, "soon", BODY);
        assert_eq!(
            verify(SECRET, "soon", BODY, &signature, 1000, 300),
            Err(SignatureError::MalformedTimestamp)
        );
    }
}
