//! # Webhook Signature Verification
//!
//! HMAC-SHA256 over the raw webhook body, compared against the hex-encoded
//! signature header the gateway sends.
//!
//! The comparison happens inside `Mac::verify_slice`, which is constant
//! time; never compare signature strings with `==`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 signature for a payload.
///
/// Exposed so tests (and local tooling) can produce valid signatures.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex-encoded HMAC-SHA256 signature against the raw payload.
///
/// Returns `false` for malformed hex as well as for a mismatch; callers
/// treat both as an unverified webhook.
pub fn verify(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
