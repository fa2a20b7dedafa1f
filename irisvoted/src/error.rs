use irisvote::Error;
use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;

/// Error body returned by every endpoint
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub ok: bool,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// A failure from the voting service
    Service(Error),

    /// An id that is not a valid UUID, reported as not found
    NotFound(String),

    /// An id that is not a valid UUID, reported as a bad request
    InvalidId(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Service(e) => status_for(e),
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::InvalidId(_) => Status::BadRequest,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (code, message) = match self {
            ApiError::Service(e) => (e.code(), e.to_string()),
            ApiError::NotFound(id) => ("not_found", format!("irisvote: {} not found", id)),
            ApiError::InvalidId(id) => ("invalid_id", format!("irisvote: invalid id {}", id)),
        };
        ErrorBody {
            ok: false,
            code,
            message,
        }
    }
}

pub fn status_for(error: &Error) -> Status {
    match error {
        Error::VoterNotFound(_)
        | Error::IdentityNotFound(_)
        | Error::ElectionNotFound(_)
        | Error::VoteNotFound(_) => Status::NotFound,
        Error::DuplicateVoter
        | Error::DuplicateVote
        | Error::NoSession(_)
        | Error::InvalidCandidate(_)
        | Error::InvalidRequest(_) => Status::BadRequest,
        Error::Verification(_) => Status::Unauthorized,
        Error::ElectionNotOpen(_) | Error::InvalidTransition { .. } | Error::Conflict(_) => {
            Status::Conflict
        }
        Error::Unavailable(_) => Status::ServiceUnavailable,
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Service(e)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        Response::build_from(Json(self.body()).respond_to(req)?)
            .status(status)
            .ok()
    }
}
