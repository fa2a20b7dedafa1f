use crate::*;
use chrono::Duration;
use std::sync::Arc;

/// Service policy knobs
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub challenge_ttl: Duration,
    pub auto_activate: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            challenge_ttl: Duration::seconds(DEFAULT_CHALLENGE_TTL_SECS),
            auto_activate: false,
        }
    }
}

/// All components wired to one store, verifier and clock
pub struct VotingService<S: Store> {
    pub identities: IdentityStore<S>,
    pub sessions: SessionManager<S>,
    pub elections: ElectionRegistry<S>,
    pub ledger: BallotLedger<S>,
    store: Arc<S>,
}

impl<S: Store> VotingService<S> {
    pub fn new(
        store: Arc<S>,
        verifier: Arc<dyn Verifier>,
        clock: Arc<dyn Clock>,
        policy: Policy,
    ) -> Self {
        VotingService {
            identities: IdentityStore::new(store.clone(), clock.clone()),
            sessions: SessionManager::new(store.clone(), verifier, clock.clone())
                .with_ttl(policy.challenge_ttl),
            elections: ElectionRegistry::new(store.clone(), clock.clone())
                .auto_activate(policy.auto_activate),
            ledger: BallotLedger::new(store.clone(), clock),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
