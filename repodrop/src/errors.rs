use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Required configuration (such as the GitHub token) is not available
    #[error("{what} not found.")]
    ConfigurationMissing { what: String },

    /// Invalid request data: missing fields or a malformed payload
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body larger than the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// The remote content API answered with a non-success status
    #[error("GitHub API error: {message}")]
    RemoteApi { status: u16, message: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ConfigurationMissing { .. } | Error::RemoteApi { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the caller in the `error` field.
    ///
    /// Remote and unexpected failures are passed through so that the submitter can see why the
    /// write did not happen.
    pub fn user_message(&self) -> String {
        match self {
            Error::Other(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::ConfigurationMissing { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::RemoteApi { status, .. } => {
                tracing::warn!(remote_status = status, "Remote content API error: {}", self);
            }
            Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Api { status, message } => Error::RemoteApi { status, message },
            other => Error::Other(other.into()),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
