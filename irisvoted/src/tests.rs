use super::*;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

struct TestDb(PathBuf);

impl TestDb {
    fn new() -> Self {
        TestDb(std::env::temp_dir().join(format!("irisvoted-{}.db", Uuid::new_v4())))
    }

    fn config(&self) -> Config {
        Config {
            db_path: self.0.to_string_lossy().into_owned(),
            auto_activate: true,
            ..Config::default()
        }
    }

    fn client(&self) -> Client {
        Client::tracked(build(self.config())).expect("valid rocket instance")
    }

    /// Run a statement on the database file outside the daemon
    fn execute(&self, statement: &str) {
        let runtime = rocket::tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let db = db::connect(&self.0.to_string_lossy(), Duration::from_secs(5))
                .await
                .unwrap();
            sqlx::query(statement).execute(&db).await.unwrap();
            db.close().await;
        });
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn post(client: &Client, uri: &str, body: Value) -> (Status, Value) {
    let response = client
        .post(uri.to_owned())
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    let status = response.status();
    (status, response.into_json().unwrap_or(Value::Null))
}

fn get(client: &Client, uri: &str) -> (Status, Value) {
    let response = client.get(uri.to_owned()).dispatch();
    let status = response.status();
    (status, response.into_json().unwrap_or(Value::Null))
}

struct Voter {
    voter_id: &'static str,
    secret: ed25519_dalek::SecretKey,
    public_key_hash: String,
}

const TEMPLATE: &[u8] = b"enrolment scan";
const SALT: &[u8] = b"device salt";

fn register(client: &Client, voter_id: &'static str) -> Voter {
    let (secret, public) = generate_keypair();
    let (status, body) = post(
        client,
        "/api/register",
        json!({
            "voter_id": voter_id,
            "name": "Test Voter",
            "public_key": irisvote::client::public_key_hex(&public),
            "iris_commitment": irisvote::client::iris_commitment(TEMPLATE, SALT),
        }),
    );
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["ok"], true);

    Voter {
        voter_id,
        secret,
        public_key_hash: body["public_key_hash"].as_str().unwrap().to_owned(),
    }
}

fn authenticate(client: &Client, voter: &Voter) -> (Status, Value) {
    let (status, body) = post(
        client,
        "/api/auth/challenge",
        json!({ "voter_id": voter.voter_id }),
    );
    assert_eq!(status, Status::Ok, "{}", body);
    let nonce = body["nonce"].as_str().unwrap();
    assert_eq!(nonce.len(), 64);

    let response =
        irisvote::client::respond_to_challenge(voter.voter_id, nonce, &voter.secret, TEMPLATE, SALT);
    post(
        client,
        "/api/auth/verify",
        json!({
            "voter_id": voter.voter_id,
            "iris_commitment_proof": response.iris_commitment_proof,
            "signed_nonce": response.signed_nonce,
        }),
    )
}

fn create_election(client: &Client) -> String {
    let (status, body) = post(
        client,
        "/api/elections",
        json!({
            "title": "Prez 2025",
            "candidates": [
                { "id": "c1", "name": "First" },
                { "id": "c2", "name": "Second" }
            ]
        }),
    );
    assert_eq!(status, Status::Ok, "{}", body);
    body["id"].as_str().unwrap().to_owned()
}

#[test]
fn index_and_health() {
    let db = TestDb::new();
    let client = db.client();

    let (status, body) = get(&client, "/");
    assert_eq!(status, Status::Ok);
    assert!(body["message"].is_string());

    let (status, body) = get(&client, "/api/health");
    assert_eq!(status, Status::Ok);
    assert_eq!(body["ok"], true);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["store"]["votes"], 0);
}

#[test]
fn register_and_authenticate() {
    let db = TestDb::new();
    let client = db.client();
    let voter = register(&client, "V1");

    // Same voter_id twice
    let (_, public) = generate_keypair();
    let (status, body) = post(
        &client,
        "/api/register",
        json!({
            "voter_id": "V1",
            "name": "Someone Else",
            "public_key": irisvote::client::public_key_hex(&public),
            "iris_commitment": irisvote::client::iris_commitment(TEMPLATE, SALT),
        }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "duplicate");

    // Verify with no challenge outstanding
    let (status, body) = post(
        &client,
        "/api/auth/verify",
        json!({ "voter_id": "V1", "iris_commitment_proof": "00", "signed_nonce": "00" }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "no_session");

    let (status, body) = post(&client, "/api/auth/challenge", json!({ "voter_id": "nobody" }));
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["ok"], false);

    let (status, body) = authenticate(&client, &voter);
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["public_key_hash"], voter.public_key_hash.as_str());
}

#[test]
fn bad_signature_is_unauthorized() {
    let db = TestDb::new();
    let client = db.client();
    let voter = register(&client, "V1");

    let (_, body) = post(&client, "/api/auth/challenge", json!({ "voter_id": "V1" }));
    let nonce = body["nonce"].as_str().unwrap();
    let (other_secret, _) = generate_keypair();
    let response = irisvote::client::respond_to_challenge("V1", nonce, &other_secret, TEMPLATE, SALT);

    let (status, body) = post(
        &client,
        "/api/auth/verify",
        json!({
            "voter_id": voter.voter_id,
            "iris_commitment_proof": response.iris_commitment_proof,
            "signed_nonce": response.signed_nonce,
        }),
    );
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["code"], "verification_failed");
}

#[test]
fn vote_and_attach_transaction() {
    let db = TestDb::new();
    let client = db.client();
    let voter = register(&client, "V1");
    assert_eq!(authenticate(&client, &voter).0, Status::Ok);
    let election_id = create_election(&client);

    let (status, body) = get(&client, &format!("/api/elections/{}", election_id));
    assert_eq!(status, Status::Ok);
    assert_eq!(body["status"], "active");

    let ballot = |candidate: &str| {
        json!({
            "election_id": election_id,
            "voter_public_key_hash": voter.public_key_hash,
            "candidate_id": candidate,
            "zk_proof": { "pi_a": ["1", "2"] },
        })
    };

    let (status, body) = post(&client, "/api/vote", ballot("c9"));
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "invalid_candidate");

    let (status, body) = post(&client, "/api/vote", ballot("c1"));
    assert_eq!(status, Status::Ok, "{}", body);
    let vote_id = body["id"].as_str().unwrap().to_owned();

    let (status, body) = post(&client, "/api/vote", ballot("c2"));
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "duplicate");

    let attach = |tx_hash: &str| json!({ "vote_id": vote_id, "tx_hash": tx_hash, "chain_id": 1 });
    let (status, body) = post(&client, "/api/vote/attach-tx", attach("0xabc"));
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["outcome"], "attached");

    let (status, body) = post(&client, "/api/vote/attach-tx", attach("0xabc"));
    assert_eq!(status, Status::Ok);
    assert_eq!(body["outcome"], "already_attached");

    let (status, body) = post(&client, "/api/vote/attach-tx", attach("0xdef"));
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["code"], "conflict");

    let (status, body) = post(
        &client,
        "/api/vote/attach-tx",
        json!({ "vote_id": "not-a-uuid", "tx_hash": "0x1" }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "invalid_id");

    let (status, _) = post(
        &client,
        "/api/vote/attach-tx",
        json!({ "vote_id": Uuid::new_v4().to_string(), "tx_hash": "0x1" }),
    );
    assert_eq!(status, Status::NotFound);

    let (status, body) = get(&client, &format!("/api/votes/{}", vote_id));
    assert_eq!(status, Status::Ok);
    assert_eq!(body["tx_hash"], "0xabc");
    assert_eq!(body["zk_proof"]["pi_a"][1], "2");

    let (status, body) = get(&client, &format!("/api/votes?election_id={}", election_id));
    assert_eq!(status, Status::Ok);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _) = get(&client, "/api/votes/not-a-uuid");
    assert_eq!(status, Status::NotFound);
}

#[test]
fn election_lifecycle() {
    let db = TestDb::new();
    let client = db.client();
    let election_id = create_election(&client);
    let status_uri = format!("/api/elections/{}/status", election_id);

    let (status, body) = post(&client, &status_uri, json!({ "status": "draft" }));
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["code"], "invalid_transition");

    let (status, body) = post(&client, &status_uri, json!({ "status": "closed" }));
    assert_eq!(status, Status::Ok);
    assert_eq!(body["status"], "closed");

    let (status, body) = get(&client, "/api/elections");
    assert_eq!(status, Status::Ok);
    assert_eq!(body["items"][0]["status"], "closed");

    let (status, body) = get(&client, "/api/elections/not-a-uuid");
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["code"], "not_found");

    // Unknown status value is rejected by the JSON guard
    let (status, body) = post(&client, &status_uri, json!({ "status": "paused" }));
    assert_eq!(status, Status::UnprocessableEntity);
    assert_eq!(body["ok"], false);
}

#[test]
fn records_survive_restart() {
    let db = TestDb::new();
    let (voter, election_id) = {
        let client = db.client();
        let voter = register(&client, "V1");
        let election_id = create_election(&client);
        let (status, _) = post(
            &client,
            "/api/vote",
            json!({
                "election_id": election_id,
                "voter_public_key_hash": voter.public_key_hash,
                "candidate_id": "c1",
            }),
        );
        assert_eq!(status, Status::Ok);
        (voter, election_id)
    };

    let client = db.client();
    let (_, body) = get(&client, "/api/health");
    assert_eq!(body["store"]["voters"], 1);
    assert_eq!(body["store"]["votes"], 1);

    // Uniqueness still holds after reload
    let (status, body) = post(
        &client,
        "/api/vote",
        json!({
            "election_id": election_id,
            "voter_public_key_hash": voter.public_key_hash,
            "candidate_id": "c2",
        }),
    );
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "duplicate");

    assert_eq!(authenticate(&client, &voter).0, Status::Ok);
}

#[test]
fn refused_writes_can_be_retried() {
    let db = TestDb::new();
    let client = db.client();
    let voter = register(&client, "V1");
    let election_id = create_election(&client);
    let ballot = json!({
        "election_id": election_id,
        "voter_public_key_hash": voter.public_key_hash,
        "candidate_id": "c1",
    });

    db.execute(
        "CREATE TRIGGER refuse_votes BEFORE INSERT ON votes \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    );

    let (status, body) = post(&client, "/api/vote", ballot.clone());
    assert_eq!(status, Status::ServiceUnavailable);
    assert_eq!(body["code"], "unavailable");

    // Nothing was kept, so the retry is not a duplicate
    let (status, body) = post(&client, "/api/vote", ballot.clone());
    assert_eq!(status, Status::ServiceUnavailable);
    assert_eq!(body["code"], "unavailable");
    let (_, body) = get(&client, "/api/health");
    assert_eq!(body["store"]["votes"], 0);

    db.execute("DROP TRIGGER refuse_votes");
    let (status, body) = post(&client, "/api/vote", ballot.clone());
    assert_eq!(status, Status::Ok, "{}", body);
    drop(client);

    let client = db.client();
    let (_, body) = get(&client, "/api/health");
    assert_eq!(body["store"]["votes"], 1);
    let (status, body) = post(&client, "/api/vote", ballot);
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "duplicate");
}

#[test]
fn refused_transitions_leave_status_unchanged() {
    let db = TestDb::new();
    let client = db.client();
    let election_id = create_election(&client);
    let status_uri = format!("/api/elections/{}/status", election_id);

    db.execute(
        "CREATE TRIGGER refuse_updates BEFORE UPDATE ON elections \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    );
    let (status, _) = post(&client, &status_uri, json!({ "status": "closed" }));
    assert_eq!(status, Status::ServiceUnavailable);
    let (_, body) = get(&client, &format!("/api/elections/{}", election_id));
    assert_eq!(body["status"], "active");

    db.execute("DROP TRIGGER refuse_updates");
    let (status, body) = post(&client, &status_uri, json!({ "status": "closed" }));
    assert_eq!(status, Status::Ok, "{}", body);
    drop(client);

    let client = db.client();
    let (_, body) = get(&client, &format!("/api/elections/{}", election_id));
    assert_eq!(body["status"], "closed");
}

#[test]
fn unreadable_records_stop_startup() {
    let db = TestDb::new();
    {
        let client = db.client();
        create_election(&client);
    }

    db.execute("UPDATE elections SET value = 'not json'");
    let result = Client::tracked(build(db.config()));
    // Rocket panics when an unhandled launch error is dropped; inspecting it marks it handled.
    if let Err(e) = &result {
        let _ = e.kind();
    }
    assert!(result.is_err());
}
