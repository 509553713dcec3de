//! HTTP-facing error mapping.
//!
//! Clients see exactly three shapes, all with a `detail` field:
//! 503 when no provider qualifies for routing, the upstream's own status
//! when an upstream error survived failover, and 500 for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use switchboard_relay::RelayError;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The router found no online provider above the success-rate floor.
    #[error("No available AI providers")]
    NoProviders,

    /// The chosen upstream (and every alternate) answered non-2xx; the
    /// primary's status and body are relayed.
    #[error("Upstream error: {body}")]
    Upstream { status: u16, body: String },

    /// Anything unexpected between accepting the request and answering it.
    #[error("{0}")]
    Internal(String),
}

impl From<RelayError> for GatewayError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::UpstreamStatus { status, body } => GatewayError::Upstream { status, body },
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::NoProviders => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn response_parts(err: GatewayError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn no_providers_maps_to_503() {
        let (status, body) = response_parts(GatewayError::NoProviders).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], "No available AI providers");
    }

    #[tokio::test]
    async fn upstream_error_keeps_the_upstream_status() {
        let (status, body) = response_parts(GatewayError::Upstream {
            status: 429,
            body: "rate limited".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["detail"], "Upstream error: rate limited");
    }

    #[tokio::test]
    async fn relay_errors_fold_into_internal() {
        let err: GatewayError = RelayError::Timeout.into();
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "request timed out");
    }
}
