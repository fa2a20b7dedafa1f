use crate::*;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub name: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
}

/// Election lifecycle: `draft -> active -> closed`, never backwards
#[derive(Serialize, Deserialize, Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    Draft,
    Active,
    Closed,
}

impl ElectionStatus {
    /// Only strictly forward moves are allowed. `draft -> closed` cancels an
    /// election that never opened.
    pub fn can_transition_to(self, next: ElectionStatus) -> bool {
        next > self
    }
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ElectionStatus::Draft => "draft",
            ElectionStatus::Active => "active",
            ElectionStatus::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ElectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ElectionStatus::Draft),
            "active" => Ok(ElectionStatus::Active),
            "closed" => Ok(ElectionStatus::Closed),
            other => Err(Error::InvalidRequest(format!(
                "unknown election status {}",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Election {
    pub id: Uuid,
    pub title: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ballot order is preserved. Candidate ids are unique within the election.
    pub candidates: Vec<Candidate>,

    pub status: ElectionStatus,
    pub start_time: DateTime<Utc>,

    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Election {
    /// Get a candidate with the given ID
    pub fn get_candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Whether a vote cast at `now` would be accepted
    pub fn check_open(&self, now: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            ElectionStatus::Draft => return Err(Error::ElectionNotOpen("election has not opened")),
            ElectionStatus::Closed => return Err(Error::ElectionNotOpen("election is closed")),
            ElectionStatus::Active => {}
        }
        if now < self.start_time {
            return Err(Error::ElectionNotOpen("voting has not started"));
        }
        if let Some(end_time) = self.end_time {
            if now > end_time {
                return Err(Error::ElectionNotOpen("voting has ended"));
            }
        }
        Ok(())
    }

    pub(crate) fn transition(&mut self, next: ElectionStatus) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Election creation request
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NewElection {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub candidates: Vec<Candidate>,

    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Election metadata and lifecycle
pub struct ElectionRegistry<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    auto_activate: bool,
}

impl<S: Store> ElectionRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        ElectionRegistry {
            store,
            clock,
            auto_activate: false,
        }
    }

    /// Open new elections immediately instead of creating them as drafts
    pub fn auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }

    pub fn create(&self, request: NewElection) -> Result<Election, Error> {
        let NewElection {
            title,
            description,
            candidates,
            start_time,
            end_time,
        } = request;

        if title.trim().is_empty() {
            return Err(Error::InvalidRequest("title is required".into()));
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        for candidate in candidates.iter() {
            if candidate.id.is_empty() {
                return Err(Error::InvalidRequest("candidate id is required".into()));
            }
            if !seen.insert(candidate.id.as_str()) {
                return Err(Error::InvalidRequest(format!(
                    "duplicate candidate id {}",
                    candidate.id
                )));
            }
        }

        let now = self.clock.now();
        let start_time = start_time.unwrap_or(now);
        if let Some(end_time) = end_time {
            if end_time <= start_time {
                return Err(Error::InvalidRequest(
                    "end_time must be after start_time".into(),
                ));
            }
        }

        let status = if self.auto_activate {
            ElectionStatus::Active
        } else {
            ElectionStatus::Draft
        };

        let election = Election {
            id: Uuid::new_v4(),
            title,
            description,
            candidates,
            status,
            start_time,
            end_time,
            created_at: now,
        };

        self.store.insert_election(&election)?;
        info!("created election {} ({})", election.id, election.status);

        Ok(election)
    }

    pub fn get(&self, election_id: Uuid) -> Result<Election, Error> {
        self.store
            .get_election(election_id)?
            .ok_or(Error::ElectionNotFound(election_id))
    }

    /// All elections in creation order
    pub fn list(&self) -> Result<Vec<Election>, Error> {
        self.store.list_elections()
    }

    pub fn transition(&self, election_id: Uuid, next: ElectionStatus) -> Result<Election, Error> {
        let election = self
            .store
            .update_election(election_id, |election| {
                election.transition(next)?;
                Ok(election.clone())
            })?
            .ok_or(Error::ElectionNotFound(election_id))?;

        info!("election {} is now {}", election.id, election.status);
        Ok(election)
    }
}
