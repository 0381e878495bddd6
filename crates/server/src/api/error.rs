//! Mapping of lifecycle errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use conductor_core::{CompletionError, EngineError, SessionError};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Completion(CompletionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(EngineError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Engine(EngineError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::UpstreamRejected { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Engine(EngineError::UpstreamTransient(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Completion(CompletionError::InvalidTicketId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Completion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Engine(err.into())
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        ApiError::Completion(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            ApiError::Engine(e) => e.to_string(),
            ApiError::Completion(e) => e.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                EngineError::NotFound {
                    ticket_id: "OPS-1".to_string(),
                    queue: None,
                },
                StatusCode::NOT_FOUND,
            ),
            (EngineError::Conflict("busy".to_string()), StatusCode::CONFLICT),
            (
                EngineError::InvalidInput("bad id".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::UpstreamRejected {
                    status: 422,
                    message: "nope".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                EngineError::UpstreamTransient("timeout".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }

        assert_eq!(
            ApiError::from(CompletionError::InvalidTicketId("a/b".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
