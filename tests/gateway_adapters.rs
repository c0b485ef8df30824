mod common;

use booking_payments::domain::payment::{CustomerInfo, GatewayKind};
use booking_payments::error::PaymentError;
use booking_payments::gateways::flutterwave::FlutterwaveGateway;
use booking_payments::gateways::paystack::PaystackGateway;
use booking_payments::gateways::{GatewayAdapter, GatewayInitRequest, GatewayVerification};
use common::credentials;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_request(reference: &str, amount_minor: i64) -> GatewayInitRequest {
    GatewayInitRequest {
        reference: reference.to_string(),
        amount_minor,
        currency: "NGN".to_string(),
        customer: CustomerInfo {
            email: "ada@example.test".to_string(),
            name: "Ada Lovelace".to_string(),
            phone: None,
        },
        callback_url: "https://app.example.test/payments/callback".to_string(),
        booking_id: Uuid::new_v4(),
    }
}

fn paystack(server: &MockServer) -> PaystackGateway {
    PaystackGateway::new(credentials(&server.uri(), "whsec"), 2_000, reqwest::Client::new())
}

fn flutterwave(server: &MockServer) -> FlutterwaveGateway {
    FlutterwaveGateway::new(credentials(&server.uri(), "whsec"), 2_000, reqwest::Client::new())
}

#[tokio::test]
async fn paystack_initiate_sends_minor_units_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(header("authorization", "Bearer sk_test_secret"))
        .and(body_partial_json(json!({"amount": 5000, "reference": "PSK-1", "currency": "NGN"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"authorization_url": "https://checkout.paystack.test/x", "access_code": "x"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = paystack(&server).initiate(&init_request("PSK-1", 5000)).await.unwrap();
    assert_eq!(resp.redirect_url, "https://checkout.paystack.test/x");
    assert_eq!(resp.access_code.as_deref(), Some("x"));
    assert_eq!(resp.public_key.as_deref(), Some("pk_test_public"));
}

#[tokio::test]
async fn paystack_non_2xx_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/PSK-2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = paystack(&server).verify("PSK-2").await.unwrap_err();
    match err {
        PaymentError::Gateway { gateway, message } => {
            assert_eq!(gateway, GatewayKind::Paystack);
            assert!(message.starts_with("HTTP_500"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn paystack_malformed_body_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/PSK-3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = paystack(&server).verify("PSK-3").await.unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { .. }));
}

#[tokio::test]
async fn paystack_explicit_failure_is_an_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/PSK-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"status": "failed", "amount": 5000, "gateway_response": "Insufficient Funds"}
        })))
        .mount(&server)
        .await;

    match paystack(&server).verify("PSK-4").await.unwrap() {
        GatewayVerification::Settled(outcome) => {
            assert!(!outcome.succeeded);
            assert_eq!(outcome.failure_reason.as_deref(), Some("Insufficient Funds"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn flutterwave_initiate_sends_major_units() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .and(body_partial_json(json!({"tx_ref": "FLW-1", "amount": "120.50"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"link": "https://checkout.flutterwave.test/pay/1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = flutterwave(&server)
        .initiate(&init_request("FLW-1", 12050))
        .await
        .unwrap();
    assert_eq!(resp.redirect_url, "https://checkout.flutterwave.test/pay/1");
}

#[tokio::test]
async fn flutterwave_rejected_initiate_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "Invalid currency"
        })))
        .mount(&server)
        .await;

    let err = flutterwave(&server)
        .initiate(&init_request("FLW-2", 100))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { ref message, .. } if message == "Invalid currency"));
}

#[tokio::test]
async fn flutterwave_verify_scales_amount() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/transactions/verify_by_reference"))
        .and(query_param("tx_ref", "FLW-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"status": "successful", "amount": 75.25, "app_fee": 1.05, "payment_type": "card"}
        })))
        .mount(&server)
        .await;

    match flutterwave(&server).verify("FLW-3").await.unwrap() {
        GatewayVerification::Settled(outcome) => {
            assert!(outcome.succeeded);
            assert_eq!(outcome.amount_minor, 7525);
            assert_eq!(outcome.fees_minor, Some(105));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn timeout_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/PSK-slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(500))
                .set_body_json(json!({"status": true, "data": {"status": "success", "amount": 1}})),
        )
        .mount(&server)
        .await;

    let gateway = PaystackGateway::new(credentials(&server.uri(), "whsec"), 50, reqwest::Client::new());
    let err = gateway.verify("PSK-slow").await.unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { ref message, .. } if message == "gateway timeout"));
}

#[tokio::test]
async fn missing_secret_key_is_unavailable() {
    let server = MockServer::start().await;
    let mut creds = credentials(&server.uri(), "whsec");
    creds.secret_key = None;
    let gateway = PaystackGateway::new(creds, 2_000, reqwest::Client::new());

    assert!(!gateway.is_available());
    let err = gateway.verify("PSK-5").await.unwrap_err();
    assert!(matches!(err, PaymentError::GatewayUnavailable(GatewayKind::Paystack)));
}

#[tokio::test]
async fn flutterwave_amount_out_of_range_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/transactions/verify_by_reference"))
        .and(query_param("tx_ref", "FLW-huge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"status": "successful", "amount": "79228162514264337593543950335"}
        })))
        .mount(&server)
        .await;

    let err = flutterwave(&server).verify("FLW-huge").await.unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { gateway: GatewayKind::Flutterwave, .. }));
}
