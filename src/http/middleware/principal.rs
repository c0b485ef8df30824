use crate::error::envelope;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

pub async fn require_principal(mut request: Request<Body>, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok());

    let Some(user_id) = user_id else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(envelope("UNAUTHORIZED", "missing or invalid user identity")),
        )
            .into_response();
    };

    request.extensions_mut().insert(Principal { user_id });
    next.run(request).await
}
