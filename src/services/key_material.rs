//! API key secret generation and hashing

use anyhow::Result;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

/// Random bytes behind every secret
const SECRET_BYTES: usize = 32;

/// Characters of the plaintext secret kept for display
pub const KEY_PREFIX_LEN: usize = 12;

/// Generate a new plaintext secret: `<prefix><base64url(32 random bytes)>`
pub fn generate_secret(prefix: &str) -> String {
    let mut secret_bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut secret_bytes);
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(secret_bytes);
    format!("{}{}", prefix, encoded)
}

/// Keyed digest of a secret, hex encoded. Deterministic for lookup by hash.
pub fn hash_secret(hash_key: &str, secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(hash_key.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid hash key: {}", e))?;
    mac.update(secret.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Display fragment of a secret
pub fn key_prefix(secret: &str) -> String {
    secret.chars().take(KEY_PREFIX_LEN).collect()
}
