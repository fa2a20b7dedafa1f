use crate::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Default freshness window for an issued challenge
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// An authentication challenge issued to a voter
///
/// Challenges are never deleted. Only the most recently issued challenge for
/// a voter is eligible for verification, and only once.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthChallenge {
    pub id: Uuid,
    pub voter_id: String,
    pub nonce: String,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
}

impl AuthChallenge {
    pub fn new(voter_id: &str, now: DateTime<Utc>) -> Self {
        AuthChallenge {
            id: Uuid::new_v4(),
            voter_id: voter_id.to_owned(),
            nonce: generate_nonce(),
            created_at: now,
            verified: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }

    /// Flip `verified`, provided this is still the challenge that was checked
    pub(crate) fn consume(&mut self, expected: Uuid) -> Result<(), Error> {
        if self.id != expected {
            return Err(Error::NoSession("challenge was superseded"));
        }
        if self.verified {
            return Err(Error::NoSession("challenge already used"));
        }
        self.verified = true;
        Ok(())
    }
}

/// Result of a successful verification
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// Anonymous identity to vote with
    pub public_key_hash: String,

    /// The challenge as stored after verification
    pub challenge: AuthChallenge,
}

/// Challenge/response authentication
///
/// Per voter: `NoSession -> Challenged -> Verified`. Issuing a new challenge
/// supersedes any earlier one.
pub struct SessionManager<S: Store> {
    store: Arc<S>,
    verifier: Arc<dyn Verifier>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<S: Store> SessionManager<S> {
    pub fn new(store: Arc<S>, verifier: Arc<dyn Verifier>, clock: Arc<dyn Clock>) -> Self {
        SessionManager {
            store,
            verifier,
            clock,
            ttl: Duration::seconds(DEFAULT_CHALLENGE_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a fresh nonce to a registered voter
    pub fn issue_challenge(&self, voter_id: &str) -> Result<AuthChallenge, Error> {
        if self.store.get_voter(voter_id)?.is_none() {
            return Err(Error::VoterNotFound(voter_id.to_owned()));
        }

        let challenge = AuthChallenge::new(voter_id, self.clock.now());
        self.store.insert_challenge(&challenge)?;
        debug!("issued challenge {} to voter {}", challenge.id, voter_id);

        Ok(challenge)
    }

    /// Verify a proof and nonce signature against the voter's active challenge
    ///
    /// The challenge is consumed with a compare-and-set, so of two racing
    /// calls at most one succeeds.
    pub fn verify(
        &self,
        voter_id: &str,
        proof: &str,
        signed_nonce: &str,
    ) -> Result<Authenticated, Error> {
        let voter = self
            .store
            .get_voter(voter_id)?
            .ok_or_else(|| Error::VoterNotFound(voter_id.to_owned()))?;

        let challenge = self
            .store
            .latest_challenge(voter_id)?
            .ok_or(Error::NoSession("no challenge issued"))?;

        if challenge.verified {
            return Err(Error::NoSession("challenge already used"));
        }
        if challenge.is_expired(self.clock.now(), self.ttl) {
            return Err(Error::NoSession("challenge expired"));
        }

        let statement = ProofStatement {
            voter_id: &voter.voter_id,
            iris_commitment: &voter.iris_commitment,
            nonce: &challenge.nonce,
        };
        let checked = self
            .verifier
            .verify_identity_proof(&statement, proof)
            .and_then(|_| {
                self.verifier.verify_signature(
                    &voter.public_key,
                    challenge.nonce.as_bytes(),
                    signed_nonce,
                )
            });
        if let Err(e) = checked {
            warn!("verification failed for voter {}: {}", voter_id, e);
            return Err(e);
        }

        let expected = challenge.id;
        let challenge = self
            .store
            .update_latest_challenge(voter_id, |latest| {
                latest.consume(expected)?;
                Ok(latest.clone())
            })?
            .ok_or(Error::NoSession("no challenge issued"))?;

        info!("voter {} authenticated", voter_id);
        Ok(Authenticated {
            public_key_hash: voter.public_key_hash,
            challenge,
        })
    }
}
