//! Voter-side helpers.
//!
//! These run on the voter's device: they derive the iris commitment to
//! register, and answer a server challenge with an identity proof and a
//! nonce signature. Secrets passed in here never need to reach the server.

use crate::*;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;

/// Hex encoding of an ed25519 public key, as registered
pub fn public_key_hex(public_key: &PublicKey) -> String {
    hex::encode(public_key.as_bytes())
}

/// Commitment to register for an iris template and salt
pub fn iris_commitment(template: &[u8], salt: &[u8]) -> String {
    IrisSecret::derive(template, salt).commitment().to_string()
}

/// Sign a challenge nonce, hex encoded
pub fn sign_nonce(secret: &SecretKey, nonce: &str) -> String {
    let public_key = PublicKey::from(secret);
    let expanded: ExpandedSecretKey = secret.into();
    hex::encode(expanded.sign(nonce.as_bytes(), &public_key).to_bytes())
}

/// Everything the verify request needs
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    pub iris_commitment_proof: String,
    pub signed_nonce: String,
}

/// Answer a challenge for `voter_id`
pub fn respond_to_challenge(
    voter_id: &str,
    nonce: &str,
    secret: &SecretKey,
    template: &[u8],
    salt: &[u8],
) -> ChallengeResponse {
    let proof = IrisSecret::derive(template, salt).prove(voter_id, nonce);
    ChallengeResponse {
        iris_commitment_proof: proof.to_hex(),
        signed_nonce: sign_nonce(secret, nonce),
    }
}
