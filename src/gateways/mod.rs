use crate::config::GatewayCredentials;
use crate::domain::payment::{CustomerInfo, GatewayKind, NormalizedOutcome};
use crate::error::PaymentError;
use crate::signature::SignatureVerifier;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub mod flutterwave;
pub mod paystack;

#[derive(Debug, Clone)]
pub struct GatewayInitRequest {
    pub reference: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: CustomerInfo,
    pub callback_url: String,
    pub booking_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct GatewayInitResponse {
    pub redirect_url: String,
    pub access_code: Option<String>,
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayVerification {
    Settled(NormalizedOutcome),
    /// The provider knows the transaction but has no final answer yet.
    InProgress { provider_status: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Succeeded {
        reference: String,
        outcome: NormalizedOutcome,
    },
    Failed {
        reference: String,
        outcome: NormalizedOutcome,
    },
    Refunded {
        reference: String,
    },
    Ignored {
        event: String,
    },
}

#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn kind(&self) -> GatewayKind;

    fn reference_prefix(&self) -> &'static str;

    fn is_available(&self) -> bool;

    fn webhook_verifier(&self) -> Option<&SignatureVerifier>;

    async fn initiate(
        &self,
        request: &GatewayInitRequest,
    ) -> Result<GatewayInitResponse, PaymentError>;

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, PaymentError>;

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<WebhookEvent, PaymentError>;
}

#[derive(Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<GatewayKind, Arc<dyn GatewayAdapter>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Arc<dyn GatewayAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: GatewayKind) -> Option<Arc<dyn GatewayAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn resolve(&self, kind: GatewayKind) -> Result<Arc<dyn GatewayAdapter>, PaymentError> {
        match self.adapters.get(&kind) {
            Some(adapter) if adapter.is_available() => Ok(adapter.clone()),
            _ => Err(PaymentError::GatewayUnavailable(kind)),
        }
    }
}

pub fn registry_from_config(
    paystack: GatewayCredentials,
    flutterwave: GatewayCredentials,
    timeout_ms: u64,
    client: reqwest::Client,
) -> GatewayRegistry {
    let registry = GatewayRegistry::new()
        .with(Arc::new(paystack::PaystackGateway::new(paystack, timeout_ms, client.clone())))
        .with(Arc::new(flutterwave::FlutterwaveGateway::new(flutterwave, timeout_ms, client)));

    for adapter in registry.adapters.values() {
        let kind = adapter.kind();
        if !adapter.is_available() {
            tracing::warn!(gateway = %kind, "secret key not configured; initiation disabled");
        }
        if adapter.webhook_verifier().is_none() {
            tracing::warn!(gateway = %kind, "webhook secret not configured; webhooks will be rejected");
        }
    }

    registry
}

pub(crate) fn transport_error(gateway: GatewayKind, e: reqwest::Error) -> PaymentError {
    if e.is_timeout() {
        PaymentError::gateway(gateway, "gateway timeout")
    } else {
        PaymentError::gateway(gateway, format!("network error: {}", e))
    }
}

pub(crate) async fn read_json(
    gateway: GatewayKind,
    resp: reqwest::Response,
) -> Result<serde_json::Value, PaymentError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PaymentError::gateway(
            gateway,
            format!("HTTP_{}: {}", status.as_u16(), body.chars().take(200).collect::<String>()),
        ));
    }

    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| PaymentError::gateway(gateway, format!("malformed response: {}", e)))
}

pub(crate) fn str_field(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_timestamp(value: &serde_json::Value, pointer: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}
