use crate::*;
use ed25519_dalek::PublicKey;
use ed25519_dalek::Signature;
use std::convert::TryFrom;

/// What an identity proof must establish
///
/// The verifier is told which commitment the voter registered and which
/// challenge they are answering; it never sees biometric data.
#[derive(Debug, Clone, Copy)]
pub struct ProofStatement<'a> {
    pub voter_id: &'a str,
    pub iris_commitment: &'a str,
    pub nonce: &'a str,
}

/// Capability interface for authentication checks
///
/// Implementations return `Error::Verification` when a proof or signature is
/// rejected and `Error::Unavailable` when an external verifier cannot be
/// reached. Nothing else.
pub trait Verifier: Send + Sync {
    /// Check a zero-knowledge proof of knowledge of the committed iris secret
    fn verify_identity_proof(&self, statement: &ProofStatement, proof: &str) -> Result<(), Error>;

    /// Check that `signature` is a signature over `message` by `public_key`
    fn verify_signature(&self, public_key: &str, message: &[u8], signature: &str)
        -> Result<(), Error>;
}

/// Schnorr identity proofs over Ristretto and ed25519 nonce signatures
#[derive(Debug, Default, Clone, Copy)]
pub struct CryptoVerifier;

impl Verifier for CryptoVerifier {
    fn verify_identity_proof(&self, statement: &ProofStatement, proof: &str) -> Result<(), Error> {
        let commitment: IrisCommitment = statement
            .iris_commitment
            .parse()
            .map_err(|_| Error::Verification("registered commitment is not a valid commitment"))?;
        let proof: IdentityProof = proof
            .parse()
            .map_err(|_| Error::Verification("malformed identity proof"))?;

        if proof.verify(&commitment, statement.voter_id, statement.nonce) {
            Ok(())
        } else {
            Err(Error::Verification("identity proof rejected"))
        }
    }

    fn verify_signature(
        &self,
        public_key: &str,
        message: &[u8],
        signature: &str,
    ) -> Result<(), Error> {
        let public_key = decode_hex(public_key)
            .ok()
            .and_then(|bytes| PublicKey::from_bytes(&bytes).ok())
            .ok_or(Error::Verification("registered public key is not an ed25519 key"))?;
        let signature = decode_hex(signature)
            .ok()
            .and_then(|bytes| Signature::try_from(&bytes[..]).ok())
            .ok_or(Error::Verification("malformed signature"))?;

        public_key
            .verify_strict(message, &signature)
            .map_err(|_| Error::Verification("signature rejected"))
    }
}

/// Test double with fixed answers
///
/// `StaticVerifier::accept_all()` is also what the daemon runs in its
/// permissive development mode.
#[derive(Debug, Clone, Copy)]
pub struct StaticVerifier {
    pub accept_proofs: bool,
    pub accept_signatures: bool,
}

impl StaticVerifier {
    pub fn accept_all() -> Self {
        StaticVerifier {
            accept_proofs: true,
            accept_signatures: true,
        }
    }

    pub fn reject_all() -> Self {
        StaticVerifier {
            accept_proofs: false,
            accept_signatures: false,
        }
    }
}

impl Verifier for StaticVerifier {
    fn verify_identity_proof(&self, _statement: &ProofStatement, _proof: &str) -> Result<(), Error> {
        if self.accept_proofs {
            Ok(())
        } else {
            Err(Error::Verification("identity proof rejected"))
        }
    }

    fn verify_signature(
        &self,
        _public_key: &str,
        _message: &[u8],
        _signature: &str,
    ) -> Result<(), Error> {
        if self.accept_signatures {
            Ok(())
        } else {
            Err(Error::Verification("signature rejected"))
        }
    }
}
