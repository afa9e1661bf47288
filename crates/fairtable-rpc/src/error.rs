use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fairtable_consensus::{ConsensusError, TransportError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RpcError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            RpcError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RpcError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            RpcError::Transport(TransportError::Closed) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            RpcError::Transport(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            RpcError::Consensus(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        };

        let body = json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}
