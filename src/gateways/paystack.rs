use crate::config::GatewayCredentials;
use crate::domain::payment::{GatewayKind, NormalizedOutcome};
use crate::error::PaymentError;
use crate::gateways::{
    parse_timestamp, read_json, str_field, transport_error, GatewayAdapter, GatewayInitRequest,
    GatewayInitResponse, GatewayVerification, WebhookEvent,
};
use crate::signature::{MacScheme, SignatureVerifier};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

const KIND: GatewayKind = GatewayKind::Paystack;

pub struct PaystackGateway {
    pub base_url: String,
    pub secret_key: Option<SecretString>,
    pub public_key: Option<String>,
    pub webhook: Option<SignatureVerifier>,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl PaystackGateway {
    pub fn new(credentials: GatewayCredentials, timeout_ms: u64, client: reqwest::Client) -> Self {
        Self {
            base_url: credentials.base_url,
            secret_key: credentials.secret_key,
            public_key: credentials.public_key,
            webhook: credentials
                .webhook_secret
                .map(|secret| SignatureVerifier::new(MacScheme::HmacSha512Hex, secret)),
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
impl GatewayAdapter for PaystackGateway {
    fn kind(&self) -> GatewayKind {
        KIND
    }

    fn reference_prefix(&self) -> &'static str {
        "PSK"
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
            "email": request.customer.email,
            "amount": request.amount_minor,
            "currency": request.currency,
            "reference": request.reference,
            "callback_url": request.callback_url,
            "metadata": {
                "booking_id": request.booking_id,
                "customer_name": request.customer.name,
                "customer_phone": request.customer.phone,
            }
        });

        let resp = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(secret)
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let v = read_json(KIND, resp).await?;
        ensure_ok(&v)?;

        let redirect_url = str_field(&v, "/data/authorization_url")
            .ok_or_else(|| PaymentError::gateway(KIND, "response missing authorization_url"))?;

        Ok(GatewayInitResponse {
            redirect_url,
            access_code: str_field(&v, "/data/access_code"),
            public_key: self.public_key.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, PaymentError> {
        let secret = self.secret()?;
        let resp = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
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
            "charge.success" | "charge.failed" => {
                let reference = str_field(data, "/reference").ok_or_else(|| {
                    PaymentError::BadRequest("webhook data is missing reference".into())
                })?;
                let succeeded = event == "charge.success";
                let outcome = outcome_from(data, payload, succeeded)
                    .map_err(PaymentError::BadRequest)?;
                Ok(if succeeded {
                    WebhookEvent::Succeeded { reference, outcome }
                } else {
                    WebhookEvent::Failed { reference, outcome }
                })
            }
            "refund.processed" => {
                let reference = str_field(data, "/transaction_reference").ok_or_else(|| {
                    PaymentError::BadRequest("refund data is missing transaction_reference".into())
                })?;
                Ok(WebhookEvent::Refunded { reference })
            }
            _ => Ok(WebhookEvent::Ignored { event }),
        }
    }
}

fn ensure_ok(v: &Value) -> Result<(), PaymentError> {
    if v.get("status").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let message = str_field(v, "/message").unwrap_or_else(|| "request rejected".to_string());
    Err(PaymentError::gateway(KIND, message))
}

fn map_transaction(data: &Value, raw: &Value) -> Result<GatewayVerification, String> {
    let status = str_field(data, "/status").ok_or("transaction missing status")?;
    match status.as_str() {
        "success" => Ok(GatewayVerification::Settled(outcome_from(data, raw, true)?)),
        "failed" | "reversed" => Ok(GatewayVerification::Settled(outcome_from(data, raw, false)?)),
        // includes "abandoned": the checkout page can still be completed
        _ => Ok(GatewayVerification::InProgress {
            provider_status: status,
        }),
    }
}

fn outcome_from(data: &Value, raw: &Value, succeeded: bool) -> Result<NormalizedOutcome, String> {
    // Paystack amounts are already in kobo.
    let amount_minor = data
        .get("amount")
        .and_then(Value::as_i64)
        .ok_or("transaction missing amount")?;

    Ok(NormalizedOutcome {
        succeeded,
        amount_minor,
        method: str_field(data, "/channel"),
        fees_minor: data.get("fees").and_then(Value::as_i64),
        authorization_code: str_field(data, "/authorization/authorization_code"),
        paid_at: parse_timestamp(data, "/paid_at").or_else(|| parse_timestamp(data, "/paidAt")),
        failure_reason: if succeeded {
            None
        } else {
            str_field(data, "/gateway_response")
        },
        raw_payload: raw.clone(),
    })
}
