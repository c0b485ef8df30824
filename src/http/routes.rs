use crate::http::handlers::{ops, payments};
use crate::http::middleware::principal::require_principal;
use crate::AppState;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;

pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/payments/initiate", post(payments::initiate_payment))
        .layer(from_fn(require_principal));

    Router::new()
        .route("/health", get(payments::health))
        .route("/payments/verify/:reference", get(payments::verify_payment))
        .route("/payments/webhook/:gateway", post(payments::ingest_webhook))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .merge(user_routes)
        .with_state(state)
}
