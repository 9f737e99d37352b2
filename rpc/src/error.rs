//! RPC error types and their HTTP mapping.
//!
//! Protocol outcomes are not errors: a rejected proposal or an unconvincing
//! commit is a 200 with the refusal in the body. This enum covers the cases
//! where the request itself is unusable or the node failed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relaynet_messages::ErrorResponse;
use relaynet_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => RpcError::NotFound(key),
            other => RpcError::Store(other.to_string()),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RpcError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            RpcError::BadSignature(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            RpcError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            RpcError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            // Backend detail stays in the logs, not on the wire.
            RpcError::Store(detail) | RpcError::Internal(detail) => {
                tracing::error!("request failed: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
