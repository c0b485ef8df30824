use crate::domain::payment::{GatewayKind, InitiatePaymentRequest};
use crate::error::PaymentError;
use crate::http::middleware::principal::Principal;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};

pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, PaymentError> {
    let Json(req) = body.map_err(|e| PaymentError::BadRequest(e.body_text()))?;
    let resp = state
        .payment_service
        .initiate(principal.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, PaymentError> {
    let payment = state.payment_service.verify(reference.trim()).await?;
    Ok(Json(payment))
}

pub async fn ingest_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentError> {
    let kind = GatewayKind::parse(&gateway)
        .ok_or_else(|| PaymentError::BadRequest(format!("unknown gateway {}", gateway)))?;
    let signature = headers
        .get(kind.signature_header())
        .and_then(|h| h.to_str().ok());

    let ack = state
        .payment_service
        .ingest_webhook(kind, &body, signature)
        .await?;
    Ok((StatusCode::OK, Json(ack)))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
