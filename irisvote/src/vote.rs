use crate::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// An off-chain mirror of a cast vote
///
/// `(election_id, voter_public_key_hash)` is unique across the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoteRecord {
    pub id: Uuid,
    pub election_id: Uuid,

    /// Anonymous voter identity
    pub voter_public_key_hash: String,

    pub candidate_id: String,

    /// Audit payload, stored verbatim
    #[serde(default)]
    pub zk_proof: Payload,

    #[serde(default)]
    pub signed_payload: Option<String>,

    #[serde(default)]
    pub tx_hash: Option<String>,

    #[serde(default)]
    pub chain_id: Option<u64>,

    #[serde(default)]
    pub contract_address: Option<String>,

    pub cast_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn is_attached(&self) -> bool {
        self.tx_hash.as_deref().map_or(false, |h| !h.is_empty())
    }

    /// Link this record to its on-chain transaction
    ///
    /// Attaching the same `tx_hash` again is a no-op; a different one is a
    /// conflict and leaves the record untouched.
    pub(crate) fn attach(&mut self, attachment: &ChainAttachment) -> Result<AttachOutcome, Error> {
        if let Some(existing) = self.tx_hash.as_deref().filter(|h| !h.is_empty()) {
            if existing == attachment.tx_hash {
                return Ok(AttachOutcome::AlreadyAttached);
            }
            return Err(Error::Conflict(existing.to_owned()));
        }

        self.tx_hash = Some(attachment.tx_hash.clone());
        self.contract_address = attachment.contract_address.clone();
        self.chain_id = attachment.chain_id;
        Ok(AttachOutcome::Attached)
    }
}

/// Vote casting request
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CastVote {
    pub election_id: Uuid,
    pub voter_public_key_hash: String,
    pub candidate_id: String,

    #[serde(default)]
    pub zk_proof: Option<Payload>,

    #[serde(default)]
    pub signed_payload: Option<String>,
}

/// On-chain transaction details for a vote
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChainAttachment {
    pub tx_hash: String,

    #[serde(default)]
    pub contract_address: Option<String>,

    #[serde(default)]
    pub chain_id: Option<u64>,
}

#[derive(Serialize, Deserialize, Copy, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachOutcome {
    Attached,
    AlreadyAttached,
}

/// Vote uniqueness and chain reconciliation
pub struct BallotLedger<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> BallotLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        BallotLedger { store, clock }
    }

    /// Record a vote
    ///
    /// The election must be open and list the candidate. The store's insert
    /// checks the election is still open and claims `(election, voter)` in
    /// one step, so a close that lands after the checks here still wins.
    pub fn cast_vote(&self, request: CastVote) -> Result<VoteRecord, Error> {
        let CastVote {
            election_id,
            voter_public_key_hash,
            candidate_id,
            zk_proof,
            signed_payload,
        } = request;

        let election = self
            .store
            .get_election(election_id)?
            .ok_or(Error::ElectionNotFound(election_id))?;

        let now = self.clock.now();
        election.check_open(now)?;

        if election.get_candidate(&candidate_id).is_none() {
            return Err(Error::InvalidCandidate(candidate_id));
        }

        if self
            .store
            .get_voter_by_hash(&voter_public_key_hash)?
            .is_none()
        {
            return Err(Error::IdentityNotFound(voter_public_key_hash));
        }

        let vote = VoteRecord {
            id: Uuid::new_v4(),
            election_id,
            voter_public_key_hash,
            candidate_id,
            zk_proof: zk_proof.unwrap_or_default(),
            signed_payload,
            tx_hash: None,
            chain_id: None,
            contract_address: None,
            cast_at: now,
        };

        self.store.insert_vote(&vote)?;
        info!(
            "vote {} cast in election {} by {}",
            vote.id,
            vote.election_id,
            redact(&vote.voter_public_key_hash)
        );

        Ok(vote)
    }

    /// Attach an on-chain transaction hash to a vote
    pub fn attach_transaction(
        &self,
        vote_id: Uuid,
        attachment: ChainAttachment,
    ) -> Result<(VoteRecord, AttachOutcome), Error> {
        if attachment.tx_hash.trim().is_empty() {
            return Err(Error::InvalidRequest("tx_hash is required".into()));
        }

        let (vote, outcome) = self
            .store
            .update_vote(vote_id, |vote| {
                let outcome = vote.attach(&attachment)?;
                Ok((vote.clone(), outcome))
            })?
            .ok_or(Error::VoteNotFound(vote_id))?;

        match outcome {
            AttachOutcome::Attached => info!("vote {} attached to tx {}", vote_id, attachment.tx_hash),
            AttachOutcome::AlreadyAttached => debug!("vote {} already attached", vote_id),
        }

        Ok((vote, outcome))
    }

    pub fn get_vote(&self, vote_id: Uuid) -> Result<VoteRecord, Error> {
        self.store
            .get_vote(vote_id)?
            .ok_or(Error::VoteNotFound(vote_id))
    }

    /// Votes, most recent first, optionally for a single election
    pub fn list_votes(&self, election_id: Option<Uuid>) -> Result<Vec<VoteRecord>, Error> {
        self.store.list_votes(election_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    struct Fixture {
        store: Arc<MemStore>,
        clock: Arc<ManualClock>,
        election: Election,
        voter_hash: String,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemStore::default());
            let clock = Arc::new(ManualClock::default());

            let voter = IdentityStore::new(store.clone(), clock.clone())
                .register(Registration {
                    voter_id: "V1".into(),
                    name: "Alan".into(),
                    public_key: "0xAB01".into(),
                    iris_commitment: "commitment".into(),
                    ..Default::default()
                })
                .unwrap();

            let elections = ElectionRegistry::new(store.clone(), clock.clone());
            let election = elections
                .create(NewElection {
                    title: "Prez 2025".into(),
                    candidates: vec![
                        Candidate {
                            id: "c1".into(),
                            name: "One".into(),
                            party: None,
                        },
                        Candidate {
                            id: "c2".into(),
                            name: "Two".into(),
                            party: Some("Blue".into()),
                        },
                    ],
                    end_time: Some(clock.now() + Duration::days(1)),
                    ..Default::default()
                })
                .unwrap();
            let election = elections
                .transition(election.id, ElectionStatus::Active)
                .unwrap();

            Fixture {
                store,
                clock,
                election,
                voter_hash: voter.public_key_hash,
            }
        }

        fn ledger(&self) -> BallotLedger<MemStore> {
            BallotLedger::new(self.store.clone(), self.clock.clone())
        }

        fn ballot(&self, candidate_id: &str) -> CastVote {
            CastVote {
                election_id: self.election.id,
                voter_public_key_hash: self.voter_hash.clone(),
                candidate_id: candidate_id.into(),
                zk_proof: None,
                signed_payload: None,
            }
        }
    }

    #[test]
    fn one_vote_per_voter_per_election() {
        let fixture = Fixture::new();
        let ledger = fixture.ledger();

        let vote = ledger.cast_vote(fixture.ballot("c1")).unwrap();
        assert_eq!(vote.candidate_id, "c1");
        assert!(!vote.is_attached());

        let err = ledger.cast_vote(fixture.ballot("c2")).unwrap_err();
        assert!(matches!(err, Error::DuplicateVote));
        assert_eq!(ledger.list_votes(None).unwrap().len(), 1);
    }

    #[test]
    fn rejects_unknown_candidate_and_closed_elections() {
        let fixture = Fixture::new();
        let ledger = fixture.ledger();

        let err = ledger.cast_vote(fixture.ballot("c9")).unwrap_err();
        assert!(matches!(err, Error::InvalidCandidate(ref c) if c == "c9"));

        let mut ballot = fixture.ballot("c1");
        ballot.election_id = Uuid::new_v4();
        assert!(ledger.cast_vote(ballot).unwrap_err().is_not_found());

        let mut ballot = fixture.ballot("c1");
        ballot.voter_public_key_hash = "unregistered".into();
        assert!(ledger.cast_vote(ballot).unwrap_err().is_not_found());

        fixture.clock.advance(Duration::days(2));
        let err = ledger.cast_vote(fixture.ballot("c1")).unwrap_err();
        assert_eq!(err.code(), "election_not_open");
    }

    #[test]
    fn draft_election_rejects_votes() {
        let fixture = Fixture::new();
        let draft = ElectionRegistry::new(fixture.store.clone(), fixture.clock.clone())
            .create(NewElection {
                title: "Draft".into(),
                candidates: fixture.election.candidates.clone(),
                ..Default::default()
            })
            .unwrap();

        let mut ballot = fixture.ballot("c1");
        ballot.election_id = draft.id;
        let err = fixture.ledger().cast_vote(ballot).unwrap_err();
        assert!(matches!(err, Error::ElectionNotOpen(_)));
    }

    #[test]
    fn concurrent_casts_yield_one_success() {
        let fixture = Fixture::new();
        let ledger = Arc::new(fixture.ledger());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let ledger = ledger.clone();
                let ballot = fixture.ballot(if i % 2 == 0 { "c1" } else { "c2" });
                std::thread::spawn(move || ledger.cast_vote(ballot))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(Error::DuplicateVote)))
                .count(),
            31
        );
    }

    #[test]
    fn attach_is_idempotent_for_same_hash() {
        let fixture = Fixture::new();
        let ledger = fixture.ledger();
        let vote = ledger.cast_vote(fixture.ballot("c1")).unwrap();

        let attachment = ChainAttachment {
            tx_hash: "0xabc".into(),
            contract_address: Some("0xcontract".into()),
            chain_id: Some(11155111),
        };
        let (attached, outcome) = ledger
            .attach_transaction(vote.id, attachment.clone())
            .unwrap();
        assert_eq!(outcome, AttachOutcome::Attached);
        assert_eq!(attached.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(attached.chain_id, Some(11155111));

        let (_, outcome) = ledger.attach_transaction(vote.id, attachment).unwrap();
        assert_eq!(outcome, AttachOutcome::AlreadyAttached);

        let err = ledger
            .attach_transaction(
                vote.id,
                ChainAttachment {
                    tx_hash: "0xdef".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref h) if h == "0xabc"));

        // The audit trail is unchanged by the rejected attach
        let stored = ledger.get_vote(vote.id).unwrap();
        assert_eq!(stored.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(stored.contract_address.as_deref(), Some("0xcontract"));
    }

    #[test]
    fn attach_unknown_or_empty() {
        let fixture = Fixture::new();
        let ledger = fixture.ledger();

        let err = ledger
            .attach_transaction(
                Uuid::new_v4(),
                ChainAttachment {
                    tx_hash: "0xabc".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::VoteNotFound(_)));

        let vote = ledger.cast_vote(fixture.ballot("c1")).unwrap();
        let err = ledger
            .attach_transaction(vote.id, ChainAttachment::default())
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn list_votes_most_recent_first() {
        let fixture = Fixture::new();
        let identities = IdentityStore::new(fixture.store.clone(), fixture.clock.clone());
        let ledger = fixture.ledger();

        let first = ledger.cast_vote(fixture.ballot("c1")).unwrap();
        let other = identities
            .register(Registration {
                voter_id: "V2".into(),
                name: "Barbara".into(),
                public_key: "0xCD02".into(),
                iris_commitment: "commitment".into(),
                ..Default::default()
            })
            .unwrap();
        fixture.clock.advance(Duration::seconds(1));
        let mut ballot = fixture.ballot("c2");
        ballot.voter_public_key_hash = other.public_key_hash;
        let second = ledger.cast_vote(ballot).unwrap();

        let ids: Vec<Uuid> = ledger
            .list_votes(Some(fixture.election.id))
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(ledger.list_votes(Some(Uuid::new_v4())).unwrap().is_empty());
    }

    /// Records votes and election status changes in commit order
    struct CommitOrder(Mutex<Vec<String>>);

    impl Journal for CommitOrder {
        fn record(&self, change: Change) -> Result<(), Error> {
            let entry = match change {
                Change::Vote(_) => "vote".to_owned(),
                Change::Election(e) => e.status.to_string(),
                _ => return Ok(()),
            };
            self.0.lock().unwrap().push(entry);
            Ok(())
        }
    }

    #[test]
    fn close_racing_casts_admits_no_late_votes() {
        let fixture = Fixture::new();
        let order = Arc::new(CommitOrder(Mutex::new(Vec::new())));
        fixture.store.set_journal(order.clone()).unwrap();

        let identities = IdentityStore::new(fixture.store.clone(), fixture.clock.clone());
        let hashes: Vec<String> = (0..32)
            .map(|i| {
                identities
                    .register(Registration {
                        voter_id: format!("R{}", i),
                        name: "Racer".into(),
                        public_key: format!("0xCAFE{:02x}", i),
                        iris_commitment: "commitment".into(),
                        ..Default::default()
                    })
                    .unwrap()
                    .public_key_hash
            })
            .collect();

        let ledger = Arc::new(fixture.ledger());
        let elections = Arc::new(ElectionRegistry::new(
            fixture.store.clone(),
            fixture.clock.clone(),
        ));
        let election_id = fixture.election.id;

        let mut handles = Vec::new();
        for (i, hash) in hashes.into_iter().enumerate() {
            if i == 16 {
                let elections = elections.clone();
                handles.push(std::thread::spawn(move || {
                    elections
                        .transition(election_id, ElectionStatus::Closed)
                        .map(|_| ())
                }));
            }
            let ledger = ledger.clone();
            let ballot = CastVote {
                election_id,
                voter_public_key_hash: hash,
                candidate_id: "c1".into(),
                zk_proof: None,
                signed_payload: None,
            };
            handles.push(std::thread::spawn(move || {
                ledger.cast_vote(ballot).map(|_| ())
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results
            .iter()
            .all(|r| r.is_ok() || matches!(r, Err(Error::ElectionNotOpen(_)))));

        // Every committed vote precedes the close
        let order = order.0.lock().unwrap().clone();
        let closed_at = order.iter().position(|e| e == "closed").unwrap();
        assert!(order[closed_at + 1..].iter().all(|e| e != "vote"));

        let accepted = results.iter().filter(|r| r.is_ok()).count() - 1;
        assert_eq!(accepted, closed_at);
        assert_eq!(fixture.store.stats().unwrap().votes, accepted);
    }
}
