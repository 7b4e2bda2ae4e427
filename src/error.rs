// =============================================================================
// Process-wide error taxonomy
// =============================================================================
//
// Five kinds, per the engine's error handling design:
//   CONFIG     — invalid strategy parameters, raised at construction.
//   CONNECTION — non-order broker failure (wrapped from broker::BrokerError).
//   ORDER      — order placement failure (wrapped from broker::BrokerError).
//   STATE      — an illegal session transition requested through the
//                control plane.
//   NOT_FOUND  — a manager operation referenced an unknown session id.
// =============================================================================

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::broker::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid strategy configuration: {0}")]
    Config(String),

    #[error("illegal session transition: {0}")]
    State(String),

    #[error("session {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::State(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Broker(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
