//! The application error type and its mapping onto HTTP responses.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::{db::StoreError, ledger::PostingError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The referenced resource does not exist, or belongs to another user.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed input: non-positive amount, unknown type, empty field...
    #[error("{0}")]
    InvalidArgument(String),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    /// A unique constraint was hit, e.g. an email that is already registered.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    /// The exchange rate provider failed or answered with garbage.
    #[error("rate lookup failed: {0}")]
    Upstream(String),

    /// Password hashing or token signing failed.
    ///
    /// The message is only logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PostingError> for Error {
    fn from(err: PostingError) -> Self {
        match err {
            PostingError::NotFound(_) => Error::NotFound("account"),
            PostingError::InvalidArgument(msg) => Error::InvalidArgument(msg),
            PostingError::InsufficientFunds { balance, requested } => {
                Error::InsufficientFunds { balance, requested }
            }
            PostingError::Store(err) => Error::Store(err),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) | Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Error::Internal(_) | Error::Store(_) => {
                tracing::error!("request failed: {self}");
                "internal server error".to_string()
            }
            other => {
                tracing::debug!("request rejected: {other}");
                other.to_string()
            }
        };
        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}
