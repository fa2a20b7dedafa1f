//! Identity proofs over iris commitments.
//!
//! A voter's iris template never leaves their device. The client hashes the
//! template together with a client-held salt into a secret scalar `x`, and
//! registers only the commitment `C = x·G` (Ristretto group). At
//! authentication time the client proves knowledge of `x` with a Schnorr
//! proof made non-interactive via Fiat-Shamir. The challenge hash binds the
//! voter id and the server-issued nonce, so a proof is only valid for the one
//! challenge it was produced for.

use crate::*;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};
use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;

const SECRET_DOMAIN: &[u8] = b"irisvote/iris-secret/v1";
const CHALLENGE_DOMAIN: &[u8] = b"irisvote/identity-proof/v1";

/// Failure to parse a commitment or proof from its hex form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofFormatError {
    #[error("invalid hexidecimal")]
    BadHex,

    #[error("wrong length: expected {expected} bytes, found {found}")]
    BadLength { expected: usize, found: usize },

    #[error("not a valid group element")]
    BadPoint,

    #[error("non-canonical scalar")]
    BadScalar,
}

/// Client-side secret behind an iris commitment
pub struct IrisSecret(Scalar);

impl IrisSecret {
    /// Derive the secret scalar from an iris template and a client salt
    pub fn derive(template: &[u8], salt: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(SECRET_DOMAIN);
        hasher.update(&(template.len() as u64).to_le_bytes());
        hasher.update(template);
        hasher.update(salt);
        IrisSecret(Scalar::from_hash(hasher))
    }

    /// The public commitment to register
    pub fn commitment(&self) -> IrisCommitment {
        IrisCommitment((&self.0 * &RISTRETTO_BASEPOINT_TABLE).compress())
    }

    /// Prove knowledge of this secret for a specific voter and nonce
    pub fn prove(&self, voter_id: &str, nonce: &str) -> IdentityProof {
        let mut csprng = rand::rngs::OsRng {};
        let blinding = Scalar::random(&mut csprng);
        let announcement = (&blinding * &RISTRETTO_BASEPOINT_TABLE).compress();
        let challenge = challenge_scalar(&self.commitment(), &announcement, voter_id, nonce);

        IdentityProof {
            announcement,
            response: blinding + challenge * self.0,
        }
    }
}

/// Commitment `C = x·G` to an iris-derived secret, hex encoded on the wire
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IrisCommitment(CompressedRistretto);

impl IrisCommitment {
    fn as_point(&self) -> Option<RistrettoPoint> {
        self.0.decompress()
    }
}

impl fmt::Display for IrisCommitment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_bytes()))
    }
}

impl FromStr for IrisCommitment {
    type Err = ProofFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s).map_err(|_| ProofFormatError::BadHex)?;
        if bytes.len() != 32 {
            return Err(ProofFormatError::BadLength {
                expected: 32,
                found: bytes.len(),
            });
        }
        let compressed = CompressedRistretto::from_slice(&bytes);
        if compressed.decompress().is_none() {
            return Err(ProofFormatError::BadPoint);
        }
        Ok(IrisCommitment(compressed))
    }
}

/// Non-interactive Schnorr proof of knowledge of the secret behind an [`IrisCommitment`]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IdentityProof {
    #[serde(with = "RistrettoHex")]
    pub announcement: CompressedRistretto,

    #[serde(with = "ScalarHex")]
    pub response: Scalar,
}

impl IdentityProof {
    /// Check the proof against a commitment, bound to `voter_id` and `nonce`
    pub fn verify(&self, commitment: &IrisCommitment, voter_id: &str, nonce: &str) -> bool {
        let committed = match commitment.as_point() {
            Some(point) => point,
            None => return false,
        };
        let announced = match self.announcement.decompress() {
            Some(point) => point,
            None => return false,
        };
        let challenge = challenge_scalar(commitment, &self.announcement, voter_id, nonce);

        &self.response * &RISTRETTO_BASEPOINT_TABLE == announced + challenge * committed
    }

    /// 64 bytes: announcement followed by response, hex encoded
    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(self.announcement.as_bytes());
        bytes.extend_from_slice(self.response.as_bytes());
        hex::encode(bytes)
    }
}

impl FromStr for IdentityProof {
    type Err = ProofFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s).map_err(|_| ProofFormatError::BadHex)?;
        if bytes.len() != 64 {
            return Err(ProofFormatError::BadLength {
                expected: 64,
                found: bytes.len(),
            });
        }
        let announcement = CompressedRistretto::from_slice(&bytes[..32]);
        let response: [u8; 32] = bytes[32..]
            .try_into()
            .map_err(|_| ProofFormatError::BadScalar)?;
        let response = Scalar::from_canonical_bytes(response).ok_or(ProofFormatError::BadScalar)?;

        Ok(IdentityProof {
            announcement,
            response,
        })
    }
}

// Length-prefix each variable input so distinct (voter_id, nonce) pairs never hash alike
fn challenge_scalar(
    commitment: &IrisCommitment,
    announcement: &CompressedRistretto,
    voter_id: &str,
    nonce: &str,
) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(CHALLENGE_DOMAIN);
    hasher.update(commitment.0.as_bytes());
    hasher.update(announcement.as_bytes());
    hasher.update(&(voter_id.len() as u64).to_le_bytes());
    hasher.update(voter_id.as_bytes());
    hasher.update(&(nonce.len() as u64).to_le_bytes());
    hasher.update(nonce.as_bytes());
    Scalar::from_hash(hasher)
}
