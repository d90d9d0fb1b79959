//! Error taxonomy for the task synchronizer.
//!
//! [`ApiError`] describes what went wrong talking to the todo API;
//! [`SyncError`] is what dashboard callers see and branch on.

use reqwest::StatusCode;
use thiserror::Error;

use crate::controller::DashboardPhase;
use crate::task::TaskId;

/// Failure of a single call against the external API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No bearer token is stored, so no authenticated request was sent.
    #[error("no stored credential")]
    MissingCredential,

    /// The server rejected the credential (HTTP 401).
    #[error("credential rejected by server")]
    Unauthorized,

    #[error("server returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingCredential)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    /// Session missing or rejected; the dashboard must route to sign-in.
    #[error("not signed in")]
    Unauthenticated,

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("dashboard is not ready (phase: {0:?})")]
    NotReady(DashboardPhase),

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        if err.is_unauthorized() {
            Self::Unauthenticated
        } else {
            Self::Api(err)
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
pub type ApiResult<T> = Result<T, ApiError>;
