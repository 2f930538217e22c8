//! API key and webhook secret helpers.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};

pub const API_KEY_PREFIX: &str = "dpk_";

const BCRYPT_COST: u32 = 10;

/// Generate a random API key
pub fn generate_api_key() -> String {
    let random_bytes: [u8; 24] = rand::random();
    format!("{}{}", API_KEY_PREFIX, BASE64.encode(random_bytes))
}

/// Generate a random webhook secret
pub fn generate_webhook_secret() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// Hash an API key for storage
pub fn hash_api_key(api_key: &str) -> Result<String> {
    bcrypt::hash(api_key, BCRYPT_COST).context("Failed to hash API key")
}

/// Verify an API key against a hash
pub fn verify_api_key(api_key: &str, hash: &str) -> bool {
    bcrypt::verify(api_key, hash).unwrap_or(false)
}
