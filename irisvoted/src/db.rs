use crate::config::Config;
use crate::Service;
use irisvote::{AuthChallenge, Change, Election, Journal, Snapshot, VoteRecord, VoterIdentity};
use rocket::fairing::{self, AdHoc};
use rocket::tokio::runtime::Handle;
use rocket::{Build, Rocket};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Db = sqlx::SqlitePool;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("irisvoted: database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("irisvoted: migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("irisvoted: stored record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("irisvoted: failed to restore store: {0}")]
    Restore(#[from] irisvote::Error),
}

/// Open the database, bounding lock waits and pool checkouts by `wait`
pub async fn connect(path: &str, wait: Duration) -> Result<Db, DbError> {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .busy_timeout(wait)
        .disable_statement_logging();

    let db = SqlitePoolOptions::new()
        .acquire_timeout(wait)
        .connect_with(opts)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    Ok(db)
}

async fn init_db(rocket: Rocket<Build>) -> fairing::Result {
    let (db_path, wait) = match rocket.state::<Config>() {
        Some(config) => (config.db_path.clone(), config.request_timeout),
        None => {
            error!("irisvoted: configuration is not managed");
            return Err(rocket);
        }
    };

    let db = match connect(&db_path, wait).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to SQLx database: {}", e);
            return Err(rocket);
        }
    };

    // Fill the in-memory store
    let service = match rocket.state::<Service>() {
        Some(service) => service.clone(),
        None => {
            error!("irisvoted: voting service is not managed");
            return Err(rocket);
        }
    };
    if let Err(e) = fill_store(&db, &service).await {
        error!("Failed to load records from {}: {}", db_path, e);
        return Err(rocket);
    }

    // From here on every change reaches sqlite before it reaches memory
    let journal = SqliteJournal {
        db: db.clone(),
        runtime: Handle::current(),
    };
    if let Err(e) = service.store().set_journal(Arc::new(journal)) {
        error!("irisvoted: failed to attach journal: {}", e);
        return Err(rocket);
    }

    Ok(rocket.manage(db))
}

pub fn stage() -> AdHoc {
    AdHoc::try_on_ignite("SQLx Database", init_db)
}

async fn fill_store(db: &Db, service: &Service) -> Result<(), DbError> {
    let snapshot = Snapshot {
        voters: load_all(db, "SELECT value FROM voters ORDER BY rowid").await?,
        challenges: load_all(db, "SELECT value FROM challenges ORDER BY rowid").await?,
        elections: load_all(db, "SELECT value FROM elections ORDER BY rowid").await?,
        votes: load_all(db, "SELECT value FROM votes ORDER BY rowid").await?,
    };
    let counts = (
        snapshot.voters.len(),
        snapshot.elections.len(),
        snapshot.votes.len(),
    );

    match service.store().restore(snapshot)? {
        0 => {}
        skipped => warn!("irisvoted: skipped {} conflicting records on load", skipped),
    }
    info!(
        "irisvoted: loaded {} voters, {} elections, {} votes",
        counts.0, counts.1, counts.2
    );

    Ok(())
}

async fn load_all<T: DeserializeOwned>(db: &Db, query: &'static str) -> Result<Vec<T>, DbError> {
    let rows: Vec<String> = sqlx::query_scalar::<_, String>(query).fetch_all(db).await?;
    rows.iter()
        .map(|row| serde_json::from_str(row).map_err(DbError::from))
        .collect()
}

fn to_json<T: Serialize>(record: &T) -> Result<String, DbError> {
    Ok(serde_json::to_string(record)?)
}

pub async fn save_voter(db: &Db, voter: &VoterIdentity) -> Result<(), DbError> {
    sqlx::query("INSERT INTO voters (id, voter_id, public_key_hash, value) VALUES (?, ?, ?, ?)")
        .bind(voter.id.to_string())
        .bind(voter.voter_id.as_str())
        .bind(voter.public_key_hash.as_str())
        .bind(to_json(voter)?)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn save_challenge(db: &Db, challenge: &AuthChallenge) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO challenges (id, voter_id, value) VALUES (?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET value = excluded.value",
    )
    .bind(challenge.id.to_string())
    .bind(challenge.voter_id.as_str())
    .bind(to_json(challenge)?)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn save_election(db: &Db, election: &Election) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO elections (id, value) VALUES (?, ?)
         ON CONFLICT (id) DO UPDATE SET value = excluded.value",
    )
    .bind(election.id.to_string())
    .bind(to_json(election)?)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn save_vote(db: &Db, vote: &VoteRecord) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO votes (id, election_id, voter_public_key_hash, value) VALUES (?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET value = excluded.value",
    )
    .bind(vote.id.to_string())
    .bind(vote.election_id.to_string())
    .bind(vote.voter_public_key_hash.as_str())
    .bind(to_json(vote)?)
    .execute(db)
    .await?;
    Ok(())
}

/// Writes each change to sqlite from inside the store lock
///
/// Runs on the blocking pool, so it can wait on the async pool directly.
/// Waits are bounded by the pool's acquire and busy timeouts; an `Err` means
/// sqlite did not commit the row.
pub struct SqliteJournal {
    db: Db,
    runtime: Handle,
}

impl Journal for SqliteJournal {
    fn record(&self, change: Change) -> Result<(), irisvote::Error> {
        let write = async {
            match change {
                Change::Voter(voter) => save_voter(&self.db, voter).await,
                Change::Challenge(challenge) => save_challenge(&self.db, challenge).await,
                Change::Election(election) => save_election(&self.db, election).await,
                Change::Vote(vote) => save_vote(&self.db, vote).await,
            }
        };

        self.runtime.block_on(write).map_err(|e| {
            error!("irisvoted: failed to persist record: {}", e);
            irisvote::Error::Unavailable("storage write failed".into())
        })
    }
}

pub async fn ping(db: &Db) -> Result<(), DbError> {
    sqlx::query("SELECT 1").execute(db).await?;
    Ok(())
}
