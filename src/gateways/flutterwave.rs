use crate::config::GatewayCredentials;
use crate::domain::money::{decimal_from_json, from_minor_units, to_minor_units};
use crate::domain::payment::{GatewayKind, NormalizedOutcome};
use crate::error::PaymentError;
use crate::gateways::{
    parse_timestamp, read_json, str_field, transport_error, GatewayAdapter, GatewayInitRequest,
    GatewayInitResponse, GatewayVerification, WebhookEvent,
};
use crate::signature::{MacScheme, SignatureVerifier};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

const KIND: GatewayKind = GatewayKind::Flutterwave;

pub struct FlutterwaveGateway {
    pub base_url: String,
    pub secret_key: Option<SecretString>,
    pub public_key: Option<String>,
    pub webhook: Option<SignatureVerifier>,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl FlutterwaveGateway {
    pub fn new(credentials: GatewayCredentials, timeout_ms: u64, client: reqwest::Client) -> Self {
        Self {
            base_url: credentials.base_url,
            secret_key: credentials.secret_key,
            public_key: credentials.public_key,
            webhook: credentials
                .webhook_secret
                .map(|secret| SignatureVerifier::new(MacScheme::HmacSha256Base64, secret)),
            timeout_ms,
            client,
        }
    }

    fn secret(&self) -> Result<&str, PaymentError> {
        self.secret_key
            .as_ref()
            .map(|s| s.expose_secret())
            .ok_or(PaymentError::GatewayUnavailable(KIND))
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for FlutterwaveGateway {
    fn kind(&self) -> GatewayKind {
        KIND
    }

    fn reference_prefix(&self) -> &'static str {
        "FLW"
    }

    fn is_available(&self) -> bool {
        self.secret_key.is_some()
    }

    fn webhook_verifier(&self) -> Option<&SignatureVerifier> {
        self.webhook.as_ref()
    }

    async fn initiate(
        &self,
        request: &GatewayInitRequest,
    ) -> Result<GatewayInitResponse, PaymentError> {
        let secret = self.secret()?;
        let body = json!({
            "tx_ref": request.reference,
            "amount": from_minor_units(request.amount_minor).to_string(),
            "currency": request.currency,
            "redirect_url": request.callback_url,
            "customer": {
                "email": request.customer.email,
                "name": request.customer.name,
                "phonenumber": request.customer.phone,
            },
            "meta": {
                "booking_id": request.booking_id,
            },
            "customizations": {
                "title": "Booking payment",
            }
        });

        let resp = self
            .client
            .post(format!("{}/v3/payments", self.base_url))
            .bearer_auth(secret)
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let v = read_json(KIND, resp).await?;
        ensure_ok(&v)?;

        let redirect_url = str_field(&v, "/data/link")
            .ok_or_else(|| PaymentError::gateway(KIND, "response missing payment link"))?;

        Ok(GatewayInitResponse {
            redirect_url,
            access_code: None,
            public_key: self.public_key.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, PaymentError> {
        let secret = self.secret()?;
        let resp = self
            .client
            .get(format!("{}/v3/transactions/verify_by_reference", self.base_url))
            .query(&[("tx_ref", reference)])
            .bearer_auth(secret)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let v = read_json(KIND, resp).await?;
        ensure_ok(&v)?;
        let data = v
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| PaymentError::gateway(KIND, "response missing data"))?;

        map_transaction(data, &v).map_err(|msg| PaymentError::gateway(KIND, msg))
    }

    fn parse_webhook(&self, payload: &Value) -> Result<WebhookEvent, PaymentError> {
        let event = str_field(payload, "/event")
            .ok_or_else(|| PaymentError::BadRequest("webhook payload is missing event".into()))?;
        let data = payload
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| PaymentError::BadRequest("webhook payload is missing data".into()))?;

        match event.as_str() {
            "charge.completed" => {
                let reference = str_field(data, "/tx_ref").ok_or_else(|| {
                    PaymentError::BadRequest("webhook data is missing tx_ref".into())
                })?;
                match map_transaction(data, payload).map_err(PaymentError::BadRequest)? {
                    GatewayVerification::Settled(outcome) if outcome.succeeded => {
                        Ok(WebhookEvent::Succeeded { reference, outcome })
                    }
                    GatewayVerification::Settled(outcome) => {
                        Ok(WebhookEvent::Failed { reference, outcome })
                    }
                    GatewayVerification::InProgress { provider_status } => {
                        Ok(WebhookEvent::Ignored {
                            event: format!("{}:{}", event, provider_status),
                        })
                    }
                }
            }
            "refund.completed" => {
                let reference = str_field(data, "/tx_ref").ok_or_else(|| {
                    PaymentError::BadRequest("refund data is missing tx_ref".into())
                })?;
                Ok(WebhookEvent::Refunded { reference })
            }
            _ => Ok(WebhookEvent::Ignored { event }),
        }
    }
}

fn ensure_ok(v: &Value) -> Result<(), PaymentError> {
    if v.get("status").and_then(Value::as_str) == Some("success") {
        return Ok(());
    }
    let message = str_field(v, "/message").unwrap_or_else(|| "request rejected".to_string());
    Err(PaymentError::gateway(KIND, message))
}

fn map_transaction(data: &Value, raw: &Value) -> Result<GatewayVerification, String> {
    let status = str_field(data, "/status").ok_or("transaction missing status")?;
    match status.as_str() {
        "successful" => Ok(GatewayVerification::Settled(outcome_from(data, raw, true)?)),
        "failed" | "cancelled" => Ok(GatewayVerification::Settled(outcome_from(data, raw, false)?)),
        _ => Ok(GatewayVerification::InProgress {
            provider_status: status,
        }),
    }
}

fn outcome_from(data: &Value, raw: &Value, succeeded: bool) -> Result<NormalizedOutcome, String> {
    let amount_minor = data
        .get("amount")
        .and_then(decimal_from_json)
        .and_then(to_minor_units)
        .ok_or("transaction missing amount")?;
    let fees_minor = data
        .get("app_fee")
        .and_then(decimal_from_json)
        .and_then(to_minor_units);

    Ok(NormalizedOutcome {
        succeeded,
        amount_minor,
        method: str_field(data, "/payment_type"),
        fees_minor,
        authorization_code: str_field(data, "/flw_ref"),
        paid_at: parse_timestamp(data, "/created_at"),
        failure_reason: if succeeded {
            None
        } else {
            str_field(data, "/processor_response").or_else(|| Some("failed".to_string()))
        },
        raw_payload: raw.clone(),
    })
}
