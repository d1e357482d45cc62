//! API key material: generation, redacted hints, and keyed digests for storage.
//!
//! Raw API keys are never stored. The key store keeps an HMAC-SHA256 digest keyed with the
//! `api_key.hash_secret` setting, so a lookup hashes the presented key and compares digests;
//! the timing of that comparison depends only on the digest, not on the raw key.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::prelude::RngExt;
use rand::rng;
use sha2::Sha256;

use crate::errors::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix for every generated API key
pub const API_KEY_PREFIX: &str = "sk-";

/// Generates a cryptographically secure API key with 256 bits of entropy.
///
/// The key is formatted as `sk-{base64url_encoded_random_bytes}`, 46 characters in total.
pub fn generate_api_key() -> String {
    let mut key_bytes = [0u8; 32];
    rng().fill(&mut key_bytes);

    format!("{API_KEY_PREFIX}{}", general_purpose::URL_SAFE_NO_PAD.encode(key_bytes))
}

/// First 8 and last 4 characters of a key, for display in listings.
pub fn key_hint(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "...".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Keyed digest of a raw API key, base64url encoded.
pub fn hash_api_key(key: &str, secret: &[u8]) -> Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| Error::Configuration {
        message: format!("invalid API key hash secret: {e}"),
    })?;
    mac.update(key.as_bytes());
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}
