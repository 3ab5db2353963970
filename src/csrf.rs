use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

use crate::error::Error;

/// Generates a cryptographically random state parameter for `OAuth2`.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates a secret for a dynamically provisioned client.
///
/// 32 random bytes, base64url without padding (43 chars).
#[must_use]
pub fn generate_client_secret() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Compares the state stored before the redirect with the one the provider sent back.
///
/// A missing or empty value on either side is a mismatch, never a skip.
///
/// # Errors
///
/// Returns [`Error::Csrf`] unless both values are present and equal.
pub fn validate_state(stored: Option<&str>, returned: Option<&str>) -> Result<(), Error> {
    match (stored, returned) {
        (Some(stored), Some(returned)) if !stored.is_empty() && stored == returned => Ok(()),
        _ => Err(Error::Csrf),
    }
}
