use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const AMOUNT_MISMATCH_REASON: &str = "amount mismatch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Paystack,
    Flutterwave,
}

impl GatewayKind {
    pub const ALL: [GatewayKind; 2] = [GatewayKind::Paystack, GatewayKind::Flutterwave];

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Paystack => "paystack",
            GatewayKind::Flutterwave => "flutterwave",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paystack" => Some(GatewayKind::Paystack),
            "flutterwave" => Some(GatewayKind::Flutterwave),
            _ => None,
        }
    }

    pub fn signature_header(&self) -> &'static str {
        match self {
            GatewayKind::Paystack => "x-paystack-signature",
            GatewayKind::Flutterwave => "flutterwave-signature",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Abandoned,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Abandoned => "ABANDONED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            "ABANDONED" => Some(PaymentStatus::Abandoned),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn holds_booking(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Success)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Success)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Pending, PaymentStatus::Abandoned)
                | (PaymentStatus::Success, PaymentStatus::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,
    pub gateway: GatewayKind,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub authorization_code: Option<String>,
    pub gateway_fees_minor: Option<i64>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub raw_gateway_payload: Option<serde_json::Value>,
    pub booking_confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub booking_confirm_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub gateway: GatewayKind,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
}

impl Payment {
    pub fn pending(input: NewPayment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference: input.reference,
            gateway: input.gateway,
            booking_id: input.booking_id,
            user_id: input.user_id,
            amount_minor: input.amount_minor,
            currency: input.currency,
            status: PaymentStatus::Pending,
            payment_method: None,
            authorization_code: None,
            gateway_fees_minor: None,
            failure_reason: None,
            paid_at: None,
            raw_gateway_payload: None,
            booking_confirmed_at: None,
            booking_confirm_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn resolve_outcome(&self, outcome: &NormalizedOutcome) -> OutcomeUpdate {
        let amount_mismatch = outcome.amount_minor != self.amount_minor;
        let (status, failure_reason, paid_at) = if amount_mismatch {
            (
                PaymentStatus::Failed,
                Some(AMOUNT_MISMATCH_REASON.to_string()),
                None,
            )
        } else if outcome.succeeded {
            (
                PaymentStatus::Success,
                None,
                Some(outcome.paid_at.unwrap_or_else(Utc::now)),
            )
        } else {
            (
                PaymentStatus::Failed,
                Some(
                    outcome
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "declined by gateway".to_string()),
                ),
                None,
            )
        };

        OutcomeUpdate {
            status,
            payment_method: outcome.method.clone(),
            authorization_code: outcome.authorization_code.clone(),
            gateway_fees_minor: outcome.fees_minor,
            failure_reason,
            paid_at,
            raw_payload: outcome.raw_payload.clone(),
            amount_mismatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOutcome {
    pub succeeded: bool,
    pub amount_minor: i64,
    pub method: Option<String>,
    pub fees_minor: Option<i64>,
    pub authorization_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub raw_payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeUpdate {
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub authorization_code: Option<String>,
    pub gateway_fees_minor: Option<i64>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw_payload: serde_json::Value,
    pub amount_mismatch: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub booking_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub gateway: Option<GatewayKind>,
}

impl InitiatePaymentRequest {
    pub fn customer(&self) -> CustomerInfo {
        CustomerInfo {
            email: self.customer_email.trim().to_string(),
            name: self.customer_name.trim().to_string(),
            phone: self
                .customer_phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub redirect_url: String,
    pub reference: String,
    pub gateway: GatewayKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}
