//! Webhook HMAC signing.
//!
//! Completion webhooks carry an `X-OnlyValid-Signature` header holding the
//! hex HMAC-SHA256 of the raw request body, keyed by the job's webhook
//! secret. Receivers recompute it to authenticate the call.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-OnlyValid-Signature";

/// Length of generated webhook secrets.
pub const WEBHOOK_SECRET_LENGTH: usize = 40;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature of `payload` under `secret`.
pub fn compute_webhook_signature(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts any key length"),
    };
    mac.update(payload.as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

/// Generate a random alphanumeric signing secret for a new job.
pub fn generate_webhook_secret() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(WEBHOOK_SECRET_LENGTH)
        .map(char::from)
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
