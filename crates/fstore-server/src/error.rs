use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fstore_store::{ErrorKind, StoreError};
use fstore_types::TypeError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TypeError> for ServerError {
    fn from(err: TypeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("multipart: {}", err.body_text()))
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {err}"))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status() {
        let cases = [
            (StoreError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (StoreError::Conflict("a".into()), StatusCode::CONFLICT),
            (StoreError::InvalidInput("a".into()), StatusCode::BAD_REQUEST),
            (StoreError::Backend("a".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn malformed_digest_is_bad_request() {
        let err = fstore_types::Digest::from_hex("zz").unwrap_err();
        assert_eq!(ServerError::from(err).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_carries_status() {
        let response = ServerError::from(StoreError::Conflict("taken".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
