use booking_payments::config::AppConfig;
use booking_payments::gateways::registry_from_config;
use booking_payments::repo::bookings_repo::BookingsRepo;
use booking_payments::repo::outbox_repo::OutboxRepo;
use booking_payments::repo::payments_repo::PaymentsRepo;
use booking_payments::service::outbox_relay::OutboxRelay;
use booking_payments::service::payment_service::PaymentService;
use booking_payments::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let gateways = registry_from_config(
        cfg.paystack,
        cfg.flutterwave,
        cfg.gateway_timeout_ms,
        reqwest::Client::new(),
    );

    let payment_service = PaymentService {
        ledger: Arc::new(PaymentsRepo { pool: pool.clone() }),
        bookings: Arc::new(BookingsRepo { pool: pool.clone() }),
        gateways,
        currency: cfg.currency.clone(),
        callback_base_url: cfg.callback_base_url.clone(),
    };

    let relay = OutboxRelay {
        outbox_repo: OutboxRepo { pool: pool.clone() },
        redis_client: redis_client.clone(),
        stream_key: cfg.stream_key.clone(),
    };
    tokio::spawn(relay.run());

    let state = AppState {
        payment_service,
        pool,
        redis_client,
    };

    let app = booking_payments::http::routes::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
