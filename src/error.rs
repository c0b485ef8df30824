use crate::domain::payment::GatewayKind;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{gateway} gateway error: {message}")]
    Gateway { gateway: GatewayKind, message: String },
    #[error("{0} gateway is not configured")]
    GatewayUnavailable(GatewayKind),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn gateway(gateway: GatewayKind, message: impl Into<String>) -> Self {
        PaymentError::Gateway {
            gateway,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Conflict(_) => StatusCode::CONFLICT,
            PaymentError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PaymentError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            PaymentError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::NotFound(_) => "NOT_FOUND",
            PaymentError::Conflict(_) => "CONFLICT",
            PaymentError::BadRequest(_) => "BAD_REQUEST",
            PaymentError::Gateway { .. } => "GATEWAY_ERROR",
            PaymentError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            PaymentError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

pub fn envelope(code: &str, message: &str) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorPayload {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        },
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let message = match &self {
            PaymentError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (self.status_code(), Json(envelope(self.code(), &message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_http_status() {
        assert_eq!(
            PaymentError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PaymentError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PaymentError::gateway(GatewayKind::Paystack, "boom").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PaymentError::GatewayUnavailable(GatewayKind::Flutterwave).to_string(),
            "flutterwave gateway is not configured"
        );
    }
}
