use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::ValidationError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const PREFIX: &str = "sha256=";

/// Compute the header value a sender would attach to `body`.
#[must_use]
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC takes keys of any size");
    mac.update(body);
    format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Check `header` against the HMAC-SHA256 of the raw `body`.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    header: Option<&str>,
) -> Result<(), ValidationError> {
    let header = header.ok_or(ValidationError::MissingSignature)?;
    let digest = header
        .strip_prefix(PREFIX)
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(ValidationError::BadSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| ValidationError::BadSignature)?;
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| ValidationError::BadSignature)
}
