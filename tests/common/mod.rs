#![allow(dead_code)]

use booking_payments::config::GatewayCredentials;
use booking_payments::domain::booking::{BookingSnapshot, BookingStatus};
use booking_payments::domain::payment::{GatewayKind, InitiatePaymentRequest};
use booking_payments::gateways::registry_from_config;
use booking_payments::repo::in_memory::{InMemoryBookings, InMemoryLedger};
use booking_payments::service::payment_service::PaymentService;
use booking_payments::signature::{MacScheme, SignatureVerifier};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PAYSTACK_WEBHOOK_SECRET: &str = "sk_test_paystack_webhook";
pub const FLUTTERWAVE_WEBHOOK_SECRET: &str = "flw_test_webhook_hash";

pub struct Harness {
    pub service: PaymentService,
    pub ledger: InMemoryLedger,
    pub bookings: InMemoryBookings,
    pub server: MockServer,
}

pub fn credentials(base_url: &str, webhook_secret: &str) -> GatewayCredentials {
    GatewayCredentials {
        base_url: base_url.to_string(),
        secret_key: Some(SecretString::from("sk_test_secret".to_string())),
        public_key: Some("pk_test_public".to_string()),
        webhook_secret: Some(SecretString::from(webhook_secret.to_string())),
    }
}

pub async fn harness() -> Harness {
    let server = MockServer::start().await;
    let gateways = registry_from_config(
        credentials(&server.uri(), PAYSTACK_WEBHOOK_SECRET),
        credentials(&server.uri(), FLUTTERWAVE_WEBHOOK_SECRET),
        2_000,
        reqwest::Client::new(),
    );
    harness_with(server, gateways)
}

pub fn harness_with(server: MockServer, gateways: booking_payments::gateways::GatewayRegistry) -> Harness {
    let ledger = InMemoryLedger::new();
    let bookings = InMemoryBookings::new();
    let service = PaymentService {
        ledger: Arc::new(ledger.clone()),
        bookings: Arc::new(bookings.clone()),
        gateways,
        currency: "NGN".to_string(),
        callback_base_url: "https://app.example.test/".to_string(),
    };
    Harness {
        service,
        ledger,
        bookings,
        server,
    }
}

impl Harness {
    /// A PENDING booking owned by a fresh user. Returns `(booking_id, user_id)`.
    pub async fn booking(&self, total: Decimal) -> (Uuid, Uuid) {
        self.booking_in(total, BookingStatus::Pending).await
    }

    pub async fn booking_in(&self, total: Decimal, status: BookingStatus) -> (Uuid, Uuid) {
        let booking = BookingSnapshot {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status,
            total_amount: total,
        };
        let ids = (booking.id, booking.user_id);
        self.bookings.insert(booking).await;
        ids
    }

    pub async fn mount_paystack_initialize(&self) {
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": "https://checkout.paystack.test/abc123",
                    "access_code": "abc123"
                }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_flutterwave_payments(&self) {
        Mock::given(method("POST"))
            .and(path("/v3/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "Hosted Link",
                "data": {"link": "https://checkout.flutterwave.test/pay/xyz"}
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_paystack_verify(&self, reference: &str, status: &str, amount_minor: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/transaction/verify/{}", reference)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": true,
                "message": "Verification successful",
                "data": {
                    "reference": reference,
                    "status": status,
                    "amount": amount_minor,
                    "channel": "card",
                    "fees": 75,
                    "paid_at": "2026-10-19T10:15:00.000Z",
                    "gateway_response": if status == "success" { "Approved" } else { "Declined" },
                    "authorization": {"authorization_code": "AUTH_test"}
                }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_flutterwave_verify(&self, reference: &str, status: &str, amount_major: &str) {
        Mock::given(method("GET"))
            .and(path("/v3/transactions/verify_by_reference"))
            .and(query_param("tx_ref", reference))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "Transaction fetched successfully",
                "data": {
                    "tx_ref": reference,
                    "flw_ref": "FLW-MOCK-1",
                    "status": status,
                    "amount": amount_major,
                    "app_fee": "1.40",
                    "payment_type": "card",
                    "created_at": "2026-10-19T10:15:00.000Z"
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Starts a PENDING Paystack payment for a fresh booking and returns its reference.
    pub async fn pending_paystack_payment(&self, total: Decimal) -> (String, Uuid) {
        self.mount_paystack_initialize().await;
        let (booking_id, user_id) = self.booking(total).await;
        let resp = self
            .service
            .initiate(user_id, initiate_request(booking_id, None))
            .await
            .expect("initiate");
        (resp.reference, booking_id)
    }
}

pub fn initiate_request(booking_id: Uuid, gateway: Option<GatewayKind>) -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        booking_id,
        customer_email: "ada@example.test".to_string(),
        customer_name: "Ada Lovelace".to_string(),
        customer_phone: Some("08030000000".to_string()),
        gateway,
    }
}

pub fn paystack_event(event: &str, reference: &str, amount_minor: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": event,
        "data": {
            "reference": reference,
            "amount": amount_minor,
            "status": if event == "charge.success" { "success" } else { "failed" },
            "channel": "card",
            "fees": 75,
            "paid_at": "2026-10-19T10:15:00.000Z",
            "gateway_response": if event == "charge.success" { "Approved" } else { "Declined" },
            "authorization": {"authorization_code": "AUTH_webhook"}
        }
    }))
    .expect("serialize")
}

pub fn flutterwave_event(reference: &str, status: &str, amount_major: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "charge.completed",
        "data": {
            "tx_ref": reference,
            "flw_ref": "FLW-MOCK-2",
            "status": status,
            "amount": amount_major,
            "app_fee": 1.4,
            "payment_type": "card",
            "created_at": "2026-10-19T10:15:00.000Z"
        }
    }))
    .expect("serialize")
}

pub fn sign_paystack(body: &[u8]) -> String {
    SignatureVerifier::new(
        MacScheme::HmacSha512Hex,
        SecretString::from(PAYSTACK_WEBHOOK_SECRET.to_string()),
    )
    .compute_mac(body)
}

pub fn sign_flutterwave(body: &[u8]) -> String {
    SignatureVerifier::new(
        MacScheme::HmacSha256Base64,
        SecretString::from(FLUTTERWAVE_WEBHOOK_SECRET.to_string()),
    )
    .compute_mac(body)
}
