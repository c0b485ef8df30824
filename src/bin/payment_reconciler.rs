use anyhow::Result;
use booking_payments::config::AppConfig;
use booking_payments::gateways::registry_from_config;
use booking_payments::repo::bookings_repo::BookingsRepo;
use booking_payments::repo::payments_repo::PaymentsRepo;
use booking_payments::service::payment_service::PaymentService;
use booking_payments::service::reconciler::PendingReconciler;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let service = PaymentService {
        ledger: Arc::new(PaymentsRepo { pool: pool.clone() }),
        bookings: Arc::new(BookingsRepo { pool }),
        gateways: registry_from_config(
            cfg.paystack,
            cfg.flutterwave,
            cfg.gateway_timeout_ms,
            reqwest::Client::new(),
        ),
        currency: cfg.currency,
        callback_base_url: cfg.callback_base_url,
    };

    tracing::info!(ttl_minutes = cfg.pending_ttl_minutes, "payment reconciler started");
    PendingReconciler::new(service, cfg.pending_ttl_minutes)
        .run(std::time::Duration::from_secs(30))
        .await;
    Ok(())
}
