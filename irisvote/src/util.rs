use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Number of random bytes in an authentication nonce (256 bits)
pub const NONCE_LENGTH: usize = 32;

pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let mut csprng = rand::rngs::OsRng {};
    let Keypair { public, secret } = Keypair::generate(&mut csprng);
    (secret, public)
}

/// Anonymous identifier for a public key: hex SHA-256 of the lowercased key text.
///
/// Lowercasing first means `0xAB..` and `0xab..` resolve to the same identity.
pub fn public_key_hash(public_key: &str) -> String {
    let normalized = public_key.to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Generate a fresh hex-encoded nonce from the OS CSPRNG
pub fn generate_nonce() -> String {
    let mut csprng = rand::rngs::OsRng {};
    let bytes: [u8; NONCE_LENGTH] = csprng.gen();
    hex::encode(bytes)
}

/// Decode hex, tolerating an optional `0x` prefix
pub fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(trimmed)
}

/// Shorten a secret-ish value for logging
pub(crate) fn redact(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or_else(|| value.len());
    &value[..end]
}
