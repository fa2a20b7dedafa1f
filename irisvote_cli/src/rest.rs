use irisvote::{ChainAttachment, NewElection, Registration};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

/// Blocking client for the irisvoted HTTP API
pub struct Rest {
    base_uri: String,
    client: Client,
}

impl Rest {
    pub fn new(base_uri: &str) -> Self {
        Rest {
            base_uri: base_uri.trim_end_matches('/').to_owned(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, RestError> {
        let res = self.client.post(&self.url(path)).json(body).send()?;
        read(res)
    }

    fn get(&self, path: &str) -> Result<Value, RestError> {
        let res = self.client.get(&self.url(path)).send()?;
        read(res)
    }

    pub fn health(&self) -> Result<Value, RestError> {
        self.get("/api/health")
    }

    pub fn register(&self, registration: &Registration) -> Result<Value, RestError> {
        self.post("/api/register", registration)
    }

    /// Returns the challenge nonce
    pub fn challenge(&self, voter_id: &str) -> Result<String, RestError> {
        let res = self.post("/api/auth/challenge", &json!({ "voter_id": voter_id }))?;
        field(&res, "nonce")
    }

    pub fn verify(
        &self,
        voter_id: &str,
        iris_commitment_proof: &str,
        signed_nonce: &str,
    ) -> Result<Value, RestError> {
        self.post(
            "/api/auth/verify",
            &json!({
                "voter_id": voter_id,
                "iris_commitment_proof": iris_commitment_proof,
                "signed_nonce": signed_nonce,
            }),
        )
    }

    pub fn create_election(&self, election: &NewElection) -> Result<Value, RestError> {
        self.post("/api/elections", election)
    }

    pub fn list_elections(&self) -> Result<Value, RestError> {
        self.get("/api/elections")
    }

    pub fn get_election(&self, id: &str) -> Result<Value, RestError> {
        self.get(&format!("/api/elections/{}", id))
    }

    pub fn set_election_status(&self, id: &str, status: &str) -> Result<Value, RestError> {
        self.post(
            &format!("/api/elections/{}/status", id),
            &json!({ "status": status }),
        )
    }

    pub fn cast_vote(&self, ballot: &Value) -> Result<Value, RestError> {
        self.post("/api/vote", ballot)
    }

    pub fn attach_tx(&self, vote_id: &str, attachment: &ChainAttachment) -> Result<Value, RestError> {
        let body = json!({
            "vote_id": vote_id,
            "tx_hash": attachment.tx_hash,
            "contract_address": attachment.contract_address,
            "chain_id": attachment.chain_id,
        });
        self.post("/api/vote/attach-tx", &body)
    }

    pub fn list_votes(&self, election_id: Option<&str>) -> Result<Value, RestError> {
        match election_id {
            Some(id) => self.get(&format!("/api/votes?election_id={}", id)),
            None => self.get("/api/votes"),
        }
    }

    pub fn get_vote(&self, id: &str) -> Result<Value, RestError> {
        self.get(&format!("/api/votes/{}", id))
    }
}

fn read(res: Response) -> Result<Value, RestError> {
    let status = res.status();
    let body: Value = res.json()?;
    if status.is_success() {
        return Ok(body);
    }

    Err(api_error(status.as_u16(), &body))
}

fn api_error(status: u16, body: &Value) -> RestError {
    let text = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_owned()
    };
    RestError::Api {
        status,
        code: text("code"),
        message: text("message"),
    }
}

fn field<T: DeserializeOwned>(body: &Value, key: &str) -> Result<T, RestError> {
    body.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| RestError::Api {
            status: 200,
            code: "invalid_response".into(),
            message: format!("response is missing {}", key),
        })
}
