// gateway/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

/// Single message for every authentication failure so callers cannot tell
/// which check rejected them.
pub const NOT_AUTHORIZED: &str = "Not authorized.";

/// Errors surfaced to HTTP callers
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Not authorized.")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Not found.")]
    NotFound,

    #[error("Command queue is full, try again later.")]
    QueueFull,

    #[error("Gateway is shutting down.")]
    ShuttingDown,

    #[error("Backend unavailable.")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::QueueFull | GatewayError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            GatewayError::Upstream(detail) => tracing::warn!("Error: [{}] {}", status.as_u16(), detail),
            _ => tracing::info!("Error: [{}] {}", status.as_u16(), self),
        }

        HttpResponse::build(status).json(json!({
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::QueueFull.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(GatewayError::Upstream("refused".into()).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_detail_not_exposed() {
        let err = GatewayError::Upstream("connect 10.0.0.5:9000 refused".into());
        assert_eq!(err.to_string(), "Backend unavailable.");
        assert_eq!(GatewayError::Unauthorized.to_string(), NOT_AUTHORIZED);
    }
}
