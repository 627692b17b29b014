//! HMAC-SHA256 request signing and verification.
//!
//! The signed message is `decimal(timestamp) ‖ nonce ‖ body`, keyed by the
//! credential secret. The body is the exact byte sequence sent on the wire;
//! verifiers never re-encode it.

use ring::hmac;

/// Length of a hex-encoded HMAC-SHA256 tag.
const SIGNATURE_HEX_LEN: usize = 64;

/// Build the message covered by the signature.
fn signing_message(timestamp: i64, nonce: &str, body: &[u8]) -> Vec<u8> {
    let timestamp = timestamp.to_string();
    let mut message = Vec::with_capacity(timestamp.len() + nonce.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(nonce.as_bytes());
    message.extend_from_slice(body);
    message
}

/// Sign a request, returning the lowercase hex digest.
pub fn sign(timestamp: i64, nonce: &str, body: &[u8], secret: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, &signing_message(timestamp, nonce, body));
    hex::encode(tag.as_ref())
}

/// Verify a candidate signature in constant time.
///
/// Only the canonical form (64 lowercase hex digits) is accepted, so two
/// different strings can never verify for the same request.
pub fn verify(candidate: &str, timestamp: i64, nonce: &str, body: &[u8], secret: &[u8]) -> bool {
    if candidate.len() != SIGNATURE_HEX_LEN
        || !candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }

    let Ok(tag) = hex::decode(candidate) else {
        return false;
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hmac::verify(&key, &signing_message(timestamp, nonce, body), &tag).is_ok()
}
