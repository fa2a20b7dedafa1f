use crate::*;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Record counts, for health reporting
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub voters: usize,
    pub challenges: usize,
    pub elections: usize,
    pub votes: usize,
}

/// Everything a store holds, used to warm a [`MemStore`] from durable storage
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub voters: Vec<VoterIdentity>,
    pub challenges: Vec<AuthChallenge>,
    pub elections: Vec<Election>,
    pub votes: Vec<VoteRecord>,
}

/// A record about to be committed
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    Voter(&'a VoterIdentity),
    Challenge(&'a AuthChallenge),
    Election(&'a Election),
    Vote(&'a VoteRecord),
}

/// Durable log behind a [`MemStore`]
///
/// `record` runs under the store lock, in commit order, before the change
/// becomes visible in memory. An error aborts the change and leaves the
/// store as it was.
pub trait Journal: Send + Sync {
    fn record(&self, change: Change) -> Result<(), Error>;
}

/// A record store
///
/// Every uniqueness rule is enforced inside a single store call: inserts
/// check and claim their keys atomically, and the `update_*` methods run
/// their closure while holding the record exclusively. Callers never do a
/// read followed by a dependent write.
pub trait Store: Send + Sync {
    /// Insert a voter. Fails `DuplicateVoter` if the voter id or public key hash is taken.
    fn insert_voter(&self, voter: &VoterIdentity) -> Result<(), Error>;

    fn get_voter(&self, voter_id: &str) -> Result<Option<VoterIdentity>, Error>;

    fn get_voter_by_hash(&self, public_key_hash: &str) -> Result<Option<VoterIdentity>, Error>;

    /// Insert a challenge, making it the voter's latest
    fn insert_challenge(&self, challenge: &AuthChallenge) -> Result<(), Error>;

    fn latest_challenge(&self, voter_id: &str) -> Result<Option<AuthChallenge>, Error>;

    /// Atomically modify the voter's latest challenge. `None` if there is none.
    fn update_latest_challenge<T, F>(&self, voter_id: &str, f: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(&mut AuthChallenge) -> Result<T, Error>;

    fn insert_election(&self, election: &Election) -> Result<(), Error>;

    fn get_election(&self, id: Uuid) -> Result<Option<Election>, Error>;

    /// All elections in creation order
    fn list_elections(&self) -> Result<Vec<Election>, Error>;

    /// Atomically modify an election. `None` if it does not exist.
    fn update_election<T, F>(&self, id: Uuid, f: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(&mut Election) -> Result<T, Error>;

    /// Insert a vote
    ///
    /// The election must exist and be open at `vote.cast_at`; that check and
    /// the `(election_id, voter_public_key_hash)` claim happen together, so a
    /// concurrent close either precedes the vote or follows it. Fails
    /// `DuplicateVote` if the pair is taken.
    fn insert_vote(&self, vote: &VoteRecord) -> Result<(), Error>;

    fn get_vote(&self, id: Uuid) -> Result<Option<VoteRecord>, Error>;

    /// Votes, most recent first
    fn list_votes(&self, election_id: Option<Uuid>) -> Result<Vec<VoteRecord>, Error>;

    /// Atomically modify a vote. `None` if it does not exist.
    fn update_vote<T, F>(&self, id: Uuid, f: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(&mut VoteRecord) -> Result<T, Error>;

    fn stats(&self) -> Result<StoreStats, Error>;
}

#[derive(Default)]
struct Inner {
    voters: IndexMap<String, VoterIdentity>,
    voters_by_hash: HashMap<String, String>,

    challenges: IndexMap<Uuid, AuthChallenge>,
    latest_challenge: HashMap<String, Uuid>,

    elections: IndexMap<Uuid, Election>,

    votes: IndexMap<Uuid, VoteRecord>,
    ballot_keys: HashSet<(Uuid, String)>,

    journal: Option<Arc<dyn Journal>>,
}

fn journal_record(journal: &Option<Arc<dyn Journal>>, change: Change) -> Result<(), Error> {
    match journal {
        Some(journal) => journal.record(change),
        None => Ok(()),
    }
}

impl Inner {
    fn insert_voter(&mut self, voter: &VoterIdentity) -> Result<(), Error> {
        if self.voters.contains_key(&voter.voter_id)
            || self.voters_by_hash.contains_key(&voter.public_key_hash)
        {
            return Err(Error::DuplicateVoter);
        }
        journal_record(&self.journal, Change::Voter(voter))?;

        self.voters_by_hash
            .insert(voter.public_key_hash.clone(), voter.voter_id.clone());
        self.voters.insert(voter.voter_id.clone(), voter.clone());
        Ok(())
    }

    fn insert_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), Error> {
        journal_record(&self.journal, Change::Challenge(challenge))?;

        // Only a newer challenge may displace the latest one
        let newer = match self
            .latest_challenge
            .get(&challenge.voter_id)
            .and_then(|id| self.challenges.get(id))
        {
            Some(latest) => challenge.created_at >= latest.created_at,
            None => true,
        };
        if newer {
            self.latest_challenge
                .insert(challenge.voter_id.clone(), challenge.id);
        }
        self.challenges.insert(challenge.id, challenge.clone());
        Ok(())
    }

    fn claim_vote(&mut self, vote: &VoteRecord) -> Result<(), Error> {
        let key = (vote.election_id, vote.voter_public_key_hash.clone());
        if self.ballot_keys.contains(&key) {
            return Err(Error::DuplicateVote);
        }
        journal_record(&self.journal, Change::Vote(vote))?;

        self.ballot_keys.insert(key);
        self.votes.insert(vote.id, vote.clone());
        Ok(())
    }
}

/// A simple store that keeps every record in memory behind one lock
///
/// With a [`Journal`] attached, every change is written to the journal
/// before it is applied, so memory never holds a record the journal refused.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    fn lock(&self) -> Result<MutexGuard<Inner>, Error> {
        self.inner
            .lock()
            .map_err(|_| Error::Unavailable("store lock poisoned".into()))
    }

    /// Route every subsequent change through `journal`
    pub fn set_journal(&self, journal: Arc<dyn Journal>) -> Result<(), Error> {
        self.lock()?.journal = Some(journal);
        Ok(())
    }

    /// Load previously persisted records
    ///
    /// Records are replayed through the same uniqueness checks as live
    /// inserts, without touching the journal; rows that collide are skipped
    /// and counted.
    pub fn restore(&self, snapshot: Snapshot) -> Result<usize, Error> {
        let mut inner = self.lock()?;
        let journal = inner.journal.take();
        let mut skipped = 0;

        for voter in snapshot.voters.iter() {
            if inner.insert_voter(voter).is_err() {
                warn!("skipping duplicate voter {} on restore", voter.voter_id);
                skipped += 1;
            }
        }
        for challenge in snapshot.challenges.iter() {
            if inner.insert_challenge(challenge).is_err() {
                skipped += 1;
            }
        }
        for election in snapshot.elections {
            inner.elections.insert(election.id, election);
        }
        for vote in snapshot.votes.iter() {
            if inner.claim_vote(vote).is_err() {
                warn!("skipping duplicate vote {} on restore", vote.id);
                skipped += 1;
            }
        }

        inner.journal = journal;
        Ok(skipped)
    }
}

impl Store for MemStore {
    fn insert_voter(&self, voter: &VoterIdentity) -> Result<(), Error> {
        self.lock()?.insert_voter(voter)
    }

    fn get_voter(&self, voter_id: &str) -> Result<Option<VoterIdentity>, Error> {
        Ok(self.lock()?.voters.get(voter_id).cloned())
    }

    fn get_voter_by_hash(&self, public_key_hash: &str) -> Result<Option<VoterIdentity>, Error> {
        let inner = self.lock()?;
        Ok(inner
            .voters_by_hash
            .get(public_key_hash)
            .and_then(|voter_id| inner.voters.get(voter_id))
            .cloned())
    }

    fn insert_challenge(&self, challenge: &AuthChallenge) -> Result<(), Error> {
        self.lock()?.insert_challenge(challenge)
    }

    fn latest_challenge(&self, voter_id: &str) -> Result<Option<AuthChallenge>, Error> {
        let inner = self.lock()?;
        Ok(inner
            .latest_challenge
            .get(voter_id)
            .and_then(|id| inner.challenges.get(id))
            .cloned())
    }

    fn update_latest_challenge<T, F>(&self, voter_id: &str, f: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(&mut AuthChallenge) -> Result<T, Error>,
    {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let id = match inner.latest_challenge.get(voter_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        let journal = &inner.journal;
        match inner.challenges.get_mut(&id) {
            Some(challenge) => update_in_place(challenge, f, |c| {
                journal_record(journal, Change::Challenge(c))
            })
            .map(Some),
            None => Ok(None),
        }
    }

    fn insert_election(&self, election: &Election) -> Result<(), Error> {
        let mut inner = self.lock()?;
        journal_record(&inner.journal, Change::Election(election))?;
        inner.elections.insert(election.id, election.clone());
        Ok(())
    }

    fn get_election(&self, id: Uuid) -> Result<Option<Election>, Error> {
        Ok(self.lock()?.elections.get(&id).cloned())
    }

    fn list_elections(&self) -> Result<Vec<Election>, Error> {
        Ok(self.lock()?.elections.values().cloned().collect())
    }

    fn update_election<T, F>(&self, id: Uuid, f: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(&mut Election) -> Result<T, Error>,
    {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let journal = &inner.journal;
        match inner.elections.get_mut(&id) {
            Some(election) => update_in_place(election, f, |e| {
                journal_record(journal, Change::Election(e))
            })
            .map(Some),
            None => Ok(None),
        }
    }

    fn insert_vote(&self, vote: &VoteRecord) -> Result<(), Error> {
        let mut inner = self.lock()?;
        inner
            .elections
            .get(&vote.election_id)
            .ok_or(Error::ElectionNotFound(vote.election_id))?
            .check_open(vote.cast_at)?;
        inner.claim_vote(vote)
    }

    fn get_vote(&self, id: Uuid) -> Result<Option<VoteRecord>, Error> {
        Ok(self.lock()?.votes.get(&id).cloned())
    }

    fn list_votes(&self, election_id: Option<Uuid>) -> Result<Vec<VoteRecord>, Error> {
        let inner = self.lock()?;
        let mut votes: Vec<VoteRecord> = inner
            .votes
            .values()
            .rev()
            .filter(|v| election_id.map_or(true, |id| v.election_id == id))
            .cloned()
            .collect();

        // Stable sort over the reversed list: equal timestamps come out newest-inserted first
        votes.sort_by(|a, b| b.cast_at.cmp(&a.cast_at));
        Ok(votes)
    }

    fn update_vote<T, F>(&self, id: Uuid, f: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(&mut VoteRecord) -> Result<T, Error>,
    {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let journal = &inner.journal;
        match inner.votes.get_mut(&id) {
            Some(vote) => {
                update_in_place(vote, f, |v| journal_record(journal, Change::Vote(v))).map(Some)
            }
            None => Ok(None),
        }
    }

    fn stats(&self) -> Result<StoreStats, Error> {
        let inner = self.lock()?;
        Ok(StoreStats {
            voters: inner.voters.len(),
            challenges: inner.challenges.len(),
            elections: inner.elections.len(),
            votes: inner.votes.len(),
        })
    }
}

// Work on a copy so a failed update or a refused journal write leaves the
// stored record untouched. Unchanged records are not journaled.
fn update_in_place<R, T, F, J>(record: &mut R, f: F, journal: J) -> Result<T, Error>
where
    R: Clone + PartialEq,
    F: FnOnce(&mut R) -> Result<T, Error>,
    J: FnOnce(&R) -> Result<(), Error>,
{
    let mut working = record.clone();
    let out = f(&mut working)?;
    if working != *record {
        journal(&working)?;
        *record = working;
    }
    Ok(out)
}
