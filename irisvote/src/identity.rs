use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque structured payload (demographics, vote proofs)
///
/// Kept in insertion order and never interpreted by the ledger.
pub type Payload = IndexMap<String, serde_json::Value>;

/// A registered voter
///
/// Created once at registration and never updated or deleted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoterIdentity {
    pub id: Uuid,

    /// Institution-issued identifier
    pub voter_id: String,

    pub name: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub demographics: Payload,

    /// Hex-encoded public key, as submitted
    pub public_key: String,

    /// Anonymous identifier used after authentication, see [`public_key_hash`]
    pub public_key_hash: String,

    /// Commitment to the voter's iris secret. Never raw biometric data.
    pub iris_commitment: String,

    pub registered_at: DateTime<Utc>,
}

/// Registration request
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Registration {
    pub voter_id: String,
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub demographics: Option<Payload>,

    pub public_key: String,
    pub iris_commitment: String,
}

/// Append-only voter registry
pub struct IdentityStore<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> IdentityStore<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        IdentityStore { store, clock }
    }

    /// Register a voter
    ///
    /// Fails with `DuplicateVoter` if either the voter id or the public key
    /// hash is already taken. Both keys are checked and claimed in one store
    /// operation.
    pub fn register(&self, registration: Registration) -> Result<VoterIdentity, Error> {
        let Registration {
            voter_id,
            name,
            email,
            demographics,
            public_key,
            iris_commitment,
        } = registration;

        let voter_id = voter_id.trim().to_owned();
        let public_key = public_key.trim().to_owned();
        if voter_id.is_empty() {
            return Err(Error::InvalidRequest("voter_id is required".into()));
        }
        if public_key.is_empty() {
            return Err(Error::InvalidRequest("public_key is required".into()));
        }
        if iris_commitment.trim().is_empty() {
            return Err(Error::InvalidRequest("iris_commitment is required".into()));
        }

        let voter = VoterIdentity {
            id: Uuid::new_v4(),
            public_key_hash: public_key_hash(&public_key),
            voter_id,
            name,
            email,
            demographics: demographics.unwrap_or_default(),
            public_key,
            iris_commitment,
            registered_at: self.clock.now(),
        };

        self.store.insert_voter(&voter)?;
        info!(
            "registered voter {} as {}",
            voter.voter_id,
            redact(&voter.public_key_hash)
        );

        Ok(voter)
    }

    pub fn lookup(&self, voter_id: &str) -> Result<VoterIdentity, Error> {
        self.store
            .get_voter(voter_id)?
            .ok_or_else(|| Error::VoterNotFound(voter_id.to_owned()))
    }

    /// Find the identity behind an anonymous public key hash
    pub fn lookup_by_hash(&self, public_key_hash: &str) -> Result<VoterIdentity, Error> {
        self.store
            .get_voter_by_hash(public_key_hash)?
            .ok_or_else(|| Error::IdentityNotFound(public_key_hash.to_owned()))
    }
}
