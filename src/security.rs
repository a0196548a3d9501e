//! Request signing and verification for webhook payloads.
//!
//! Signatures bind the delivery id, unix timestamp and raw payload to the
//! subscription secret: HMAC-SHA256 over `"{id}.{timestamp}.{payload}"`,
//! base64-encoded and tagged with a scheme version (`v1,<mac>`). A signature
//! header may carry several space-separated signatures so endpoints keep
//! verifying across a secret rotation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Scheme version tag prefixed to every signature.
const SCHEME_V1: &str = "v1";

/// Number of random bytes in a generated subscription secret.
const SECRET_BYTES: usize = 24;

/// Compute the `v1,<base64 mac>` signature for a delivery.
///
/// Deterministic: same inputs always produce the same signature.
pub fn sign(id: &str, timestamp_secs: i64, secret: &str, payload: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp_secs.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    format!("{SCHEME_V1},{}", BASE64.encode(mac.finalize().into_bytes()))
}

/// Verify a signature header against the signed content.
///
/// The header may carry multiple space-separated signatures; verification
/// succeeds if any one matches via constant-time comparison. Returns
/// `Ok(false)` for well-formed non-matching signatures and
/// [`WebhookError::InvalidSignatureFormat`] when the header cannot be parsed.
/// Entries with an unknown scheme tag are skipped, not rejected.
pub fn verify(
    header: &str,
    id: &str,
    timestamp_secs: i64,
    secret: &str,
    payload: &[u8],
) -> Result<bool, WebhookError> {
    if header.trim().is_empty() {
        return Err(WebhookError::InvalidSignatureFormat(
            "empty signature header".to_string(),
        ));
    }

    let expected = sign(id, timestamp_secs, secret, payload);
    let expected_mac = expected
        .split_once(',')
        .map(|(_, mac)| mac)
        .unwrap_or_default();

    for part in header.split_whitespace() {
        let (scheme, mac) = part.split_once(',').ok_or_else(|| {
            WebhookError::InvalidSignatureFormat(format!("missing scheme separator in {part:?}"))
        })?;
        if scheme.is_empty() || mac.is_empty() {
            return Err(WebhookError::InvalidSignatureFormat(format!(
                "empty scheme or mac in {part:?}"
            )));
        }
        if scheme != SCHEME_V1 {
            continue;
        }
        if constant_time_eq(mac.as_bytes(), expected_mac.as_bytes()) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Generate a new subscription secret: 24 random bytes, base64-encoded.
#[must_use]
pub fn new_secret() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
