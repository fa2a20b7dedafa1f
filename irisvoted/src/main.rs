use config::Config;
use db::Db;
use error::{ApiError, ApiResult, ErrorBody};
use irisvote::*;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::tokio::task::spawn_blocking;
use rocket::tokio::time::timeout;
use rocket::{Build, Request, Rocket, State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[macro_use]
extern crate rocket;

mod config;
mod db;
mod error;

pub type Service = Arc<VotingService<MemStore>>;

/// Run a read on the blocking pool, giving up after the request timeout
async fn bounded<T, F>(config: &Config, f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    match timeout(config.request_timeout, spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(Error::Unavailable(format!("worker failed: {}", e))),
        Err(_) => Err(Error::Unavailable("request timed out".into())),
    }
}

/// Run a change on the blocking pool and wait for its outcome
///
/// Not abandoned on timeout: the answer must say whether the change was
/// committed. Storage waits inside the change are bounded by the database
/// timeouts instead.
async fn commit<T, F>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(Error::Unavailable(format!("worker failed: {}", e))),
    }
}

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound(id.to_owned()))
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Serialize)]
struct Health {
    ok: bool,
    store: StoreStats,
    database: String,
}

#[derive(Serialize)]
struct Created {
    ok: bool,
    id: Uuid,
}

#[derive(Serialize)]
struct Registered {
    ok: bool,
    id: Uuid,
    public_key_hash: String,
}

#[derive(Deserialize)]
struct ChallengeRequest {
    voter_id: String,
}

#[derive(Serialize)]
struct ChallengeIssued {
    ok: bool,
    nonce: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    voter_id: String,
    iris_commitment_proof: String,
    signed_nonce: String,
}

#[derive(Serialize)]
struct Verified {
    ok: bool,
    public_key_hash: String,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: ElectionStatus,
}

#[derive(Deserialize)]
struct CastVoteRequest {
    election_id: String,
    voter_public_key_hash: String,
    candidate_id: String,
    #[serde(default)]
    zk_proof: Option<Payload>,
    #[serde(default)]
    signed_payload: Option<String>,
}

#[derive(Deserialize)]
struct AttachTxRequest {
    vote_id: String,
    tx_hash: String,
    #[serde(default)]
    contract_address: Option<String>,
    #[serde(default)]
    chain_id: Option<u64>,
}

#[derive(Serialize)]
struct Attached {
    ok: bool,
    outcome: AttachOutcome,
}

#[derive(Serialize)]
struct Items<T> {
    items: Vec<T>,
}

#[get("/")]
fn index() -> Json<Message> {
    Json(Message {
        message: "Voting API running",
    })
}

#[get("/api/health")]
async fn health(service: &State<Service>, config: &State<Config>, db: &State<Db>) -> ApiResult<Json<Health>> {
    let svc = service.inner().clone();
    let store = bounded(config, move || svc.store().stats()).await?;
    let database = match timeout(config.request_timeout, db::ping(db)).await {
        Ok(Ok(())) => "connected".to_owned(),
        Ok(Err(e)) => format!("error: {}", e),
        Err(_) => "error: timed out".to_owned(),
    };

    Ok(Json(Health {
        ok: database == "connected",
        store,
        database,
    }))
}

#[post("/api/register", data = "<registration>")]
async fn register(
    service: &State<Service>,
    registration: Json<Registration>,
) -> ApiResult<Json<Registered>> {
    let svc = service.inner().clone();
    let voter = commit(move || {
        svc.identities.register(registration.into_inner())
    })
    .await?;

    Ok(Json(Registered {
        ok: true,
        id: voter.id,
        public_key_hash: voter.public_key_hash,
    }))
}

#[post("/api/auth/challenge", data = "<request>")]
async fn auth_challenge(
    service: &State<Service>,
    request: Json<ChallengeRequest>,
) -> ApiResult<Json<ChallengeIssued>> {
    let svc = service.inner().clone();
    let challenge = commit(move || {
        svc.sessions.issue_challenge(&request.voter_id)
    })
    .await?;

    Ok(Json(ChallengeIssued {
        ok: true,
        nonce: challenge.nonce,
    }))
}

#[post("/api/auth/verify", data = "<request>")]
async fn auth_verify(
    service: &State<Service>,
    request: Json<VerifyRequest>,
) -> ApiResult<Json<Verified>> {
    let svc = service.inner().clone();
    let authenticated = commit(move || {
        svc.sessions.verify(
            &request.voter_id,
            &request.iris_commitment_proof,
            &request.signed_nonce,
        )
    })
    .await?;

    Ok(Json(Verified {
        ok: true,
        public_key_hash: authenticated.public_key_hash,
    }))
}

#[post("/api/elections", data = "<request>")]
async fn create_election(
    service: &State<Service>,
    request: Json<NewElection>,
) -> ApiResult<Json<Created>> {
    let svc = service.inner().clone();
    let election = commit(move || svc.elections.create(request.into_inner())).await?;

    Ok(Json(Created {
        ok: true,
        id: election.id,
    }))
}

#[get("/api/elections")]
async fn list_elections(
    service: &State<Service>,
    config: &State<Config>,
) -> ApiResult<Json<Items<Election>>> {
    let svc = service.inner().clone();
    let items = bounded(config, move || svc.elections.list()).await?;
    Ok(Json(Items { items }))
}

#[get("/api/elections/<id>")]
async fn read_election(
    service: &State<Service>,
    config: &State<Config>,
    id: &str,
) -> ApiResult<Json<Election>> {
    let id = parse_id(id)?;
    let svc = service.inner().clone();
    let election = bounded(config, move || svc.elections.get(id)).await?;
    Ok(Json(election))
}

#[post("/api/elections/<id>/status", data = "<request>")]
async fn transition_election(
    service: &State<Service>,
    id: &str,
    request: Json<StatusRequest>,
) -> ApiResult<Json<Election>> {
    let id = parse_id(id)?;
    let svc = service.inner().clone();
    let status = request.status;
    let election = commit(move || svc.elections.transition(id, status)).await?;

    Ok(Json(election))
}

#[post("/api/vote", data = "<request>")]
async fn cast_vote(
    service: &State<Service>,
    request: Json<CastVoteRequest>,
) -> ApiResult<Json<Created>> {
    let CastVoteRequest {
        election_id,
        voter_public_key_hash,
        candidate_id,
        zk_proof,
        signed_payload,
    } = request.into_inner();
    let ballot = CastVote {
        election_id: parse_id(&election_id)?,
        voter_public_key_hash,
        candidate_id,
        zk_proof,
        signed_payload,
    };

    let svc = service.inner().clone();
    let vote = commit(move || svc.ledger.cast_vote(ballot)).await?;

    Ok(Json(Created {
        ok: true,
        id: vote.id,
    }))
}

#[post("/api/vote/attach-tx", data = "<request>")]
async fn attach_tx(
    service: &State<Service>,
    request: Json<AttachTxRequest>,
) -> ApiResult<Json<Attached>> {
    let AttachTxRequest {
        vote_id,
        tx_hash,
        contract_address,
        chain_id,
    } = request.into_inner();
    let id = Uuid::parse_str(&vote_id).map_err(|_| ApiError::InvalidId(vote_id.clone()))?;
    let attachment = ChainAttachment {
        tx_hash,
        contract_address,
        chain_id,
    };

    let svc = service.inner().clone();
    let (_, outcome) =
        commit(move || svc.ledger.attach_transaction(id, attachment)).await?;

    Ok(Json(Attached { ok: true, outcome }))
}

#[get("/api/votes?<election_id>")]
async fn list_votes(
    service: &State<Service>,
    config: &State<Config>,
    election_id: Option<&str>,
) -> ApiResult<Json<Items<VoteRecord>>> {
    let election_id = election_id.map(parse_id).transpose()?;
    let svc = service.inner().clone();
    let items = bounded(config, move || svc.ledger.list_votes(election_id)).await?;
    Ok(Json(Items { items }))
}

#[get("/api/votes/<id>")]
async fn read_vote(
    service: &State<Service>,
    config: &State<Config>,
    id: &str,
) -> ApiResult<Json<VoteRecord>> {
    let id = parse_id(id)?;
    let svc = service.inner().clone();
    let vote = bounded(config, move || svc.ledger.get_vote(id)).await?;
    Ok(Json(vote))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let code = match status.code {
        404 => "not_found",
        400 | 422 => "invalid_request",
        _ => "internal",
    };
    (
        status,
        Json(ErrorBody {
            ok: false,
            code,
            message: format!("irisvote: {}", status.reason_lossy()),
        }),
    )
}

pub fn build(config: Config) -> Rocket<Build> {
    let service: Service = Arc::new(VotingService::new(
        Arc::new(MemStore::default()),
        config.verifier(),
        Arc::new(SystemClock),
        config.policy(),
    ));

    rocket::build()
        .manage(config)
        .manage(service)
        .attach(db::stage())
        .mount(
            "/",
            routes![
                index,
                health,
                register,
                auth_challenge,
                auth_verify,
                create_election,
                list_elections,
                read_election,
                transition_election,
                cast_vote,
                attach_tx,
                list_votes,
                read_vote
            ],
        )
        .register("/", catchers![default_catcher])
}

#[launch]
fn rocket() -> _ {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    build(config)
}

#[cfg(test)]
mod tests;
