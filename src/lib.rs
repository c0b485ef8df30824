pub mod config;
pub mod domain {
    pub mod booking;
    pub mod money;
    pub mod payment;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod payments;
    }
    pub mod middleware {
        pub mod principal;
    }
    pub mod routes;
}
pub mod reference;
pub mod repo {
    pub mod bookings_repo;
    pub mod in_memory;
    pub mod outbox_repo;
    pub mod payments_repo;
}
pub mod service {
    pub mod outbox_relay;
    pub mod payment_service;
    pub mod reconciler;
}
pub mod signature;

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub pool: sqlx::PgPool,
    pub redis_client: redis::Client,
}
