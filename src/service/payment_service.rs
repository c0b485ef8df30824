use crate::domain::booking::BookingStatus;
use crate::domain::payment::{
    GatewayKind, InitiatePaymentRequest, InitiatePaymentResponse, NewPayment, NormalizedOutcome,
    Payment, PaymentStatus,
};
use crate::error::PaymentError;
use crate::gateways::{GatewayInitRequest, GatewayRegistry, GatewayVerification, WebhookEvent};
use crate::reference;
use crate::repo::bookings_repo::BookingGate;
use crate::repo::payments_repo::PaymentLedger;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentService {
    pub ledger: Arc<dyn PaymentLedger>,
    pub bookings: Arc<dyn BookingGate>,
    pub gateways: GatewayRegistry,
    pub currency: String,
    pub callback_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookAck {
    Applied {
        reference: String,
        status: PaymentStatus,
    },
    UnknownReference {
        reference: String,
    },
    Ignored {
        event: String,
    },
}

impl PaymentService {
    pub async fn initiate(
        &self,
        user_id: Uuid,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, PaymentError> {
        let customer = req.customer();
        if customer.email.is_empty() || !customer.email.contains('@') {
            return Err(PaymentError::BadRequest("customerEmail must be a valid email".into()));
        }
        if customer.name.is_empty() {
            return Err(PaymentError::BadRequest("customerName is required".into()));
        }

        let gateway = req.gateway.unwrap_or_default();
        let adapter = self.gateways.resolve(gateway)?;

        let booking = self
            .bookings
            .load(req.booking_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("booking {} not found", req.booking_id)))?;

        if booking.user_id != user_id {
            return Err(PaymentError::Conflict(
                "booking does not belong to the requesting user".into(),
            ));
        }
        match booking.status {
            BookingStatus::Pending => {}
            BookingStatus::Confirmed => {
                return Err(PaymentError::Conflict("booking is already confirmed".into()))
            }
            BookingStatus::Cancelled => {
                return Err(PaymentError::Conflict("booking is cancelled".into()))
            }
        }

        if let Some(open) = self.ledger.find_open_for_booking(booking.id).await? {
            return Err(PaymentError::Conflict(format!(
                "booking already has a {} payment ({})",
                open.status, open.reference
            )));
        }

        let amount_minor = booking
            .amount_minor()
            .ok_or_else(|| PaymentError::Conflict("booking total is not payable".into()))?;

        let reference = reference::generate(adapter.reference_prefix());
        let init = adapter
            .initiate(&GatewayInitRequest {
                reference: reference.clone(),
                amount_minor,
                currency: self.currency.clone(),
                customer,
                callback_url: format!(
                    "{}/payments/callback",
                    self.callback_base_url.trim_end_matches('/')
                ),
                booking_id: booking.id,
            })
            .await?;

        let payment = Payment::pending(NewPayment {
            reference: reference.clone(),
            gateway,
            booking_id: booking.id,
            user_id,
            amount_minor,
            currency: self.currency.clone(),
        });

        if let Err(e) = self.ledger.insert_pending(&payment).await {
            tracing::warn!(
                reference = %reference,
                booking_id = %booking.id,
                "payment not recorded after gateway initiation: {}",
                e
            );
            return Err(e);
        }

        tracing::info!(
            reference = %reference,
            gateway = %gateway,
            booking_id = %booking.id,
            amount_minor,
            "payment initiated"
        );

        Ok(InitiatePaymentResponse {
            redirect_url: init.redirect_url,
            reference,
            gateway,
            access_code: init.access_code,
            public_key: init.public_key,
        })
    }

    pub async fn verify(&self, reference: &str) -> Result<Payment, PaymentError> {
        let payment = self
            .ledger
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {} not found", reference)))?;

        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let adapter = self.gateways.resolve(payment.gateway)?;
        match adapter.verify(reference).await? {
            GatewayVerification::Settled(outcome) => self.apply_outcome(payment, outcome).await,
            GatewayVerification::InProgress { provider_status } => {
                tracing::info!(reference = %reference, provider_status = %provider_status, "payment still in progress");
                Ok(payment)
            }
        }
    }

    /// `raw` must be the body exactly as received; the MAC covers those bytes.
    pub async fn ingest_webhook(
        &self,
        gateway: GatewayKind,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, PaymentError> {
        if raw.is_empty() {
            return Err(PaymentError::BadRequest("missing webhook payload".into()));
        }
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PaymentError::BadRequest("missing webhook signature".into()))?;

        let adapter = self
            .gateways
            .get(gateway)
            .ok_or_else(|| PaymentError::BadRequest(format!("{} webhooks are not accepted", gateway)))?;
        let verifier = adapter.webhook_verifier().ok_or_else(|| {
            PaymentError::BadRequest(format!("{} webhook secret is not configured", gateway))
        })?;

        if !verifier.verify(raw, signature) {
            tracing::warn!(target: "security", gateway = %gateway, "webhook rejected: invalid signature");
            return Err(PaymentError::BadRequest("invalid signature".into()));
        }

        let payload: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|_| PaymentError::BadRequest("malformed webhook payload".into()))?;
        let has_event = payload.get("event").and_then(|e| e.as_str()).is_some();
        let has_data = payload.get("data").map(|d| d.is_object()).unwrap_or(false);
        if !has_event || !has_data {
            return Err(PaymentError::BadRequest(
                "webhook payload is missing event or data".into(),
            ));
        }

        match adapter.parse_webhook(&payload)? {
            WebhookEvent::Succeeded { reference, outcome }
            | WebhookEvent::Failed { reference, outcome } => {
                let Some(payment) = self.ledger.find_by_reference(&reference).await? else {
                    tracing::warn!(gateway = %gateway, reference = %reference, "webhook for unknown payment");
                    return Ok(WebhookAck::UnknownReference { reference });
                };
                if payment.gateway != gateway {
                    tracing::warn!(
                        target: "security",
                        gateway = %gateway,
                        reference = %reference,
                        "webhook gateway does not match payment gateway"
                    );
                    return Ok(WebhookAck::UnknownReference { reference });
                }
                let applied = self.apply_outcome(payment, outcome).await?;
                Ok(WebhookAck::Applied {
                    reference,
                    status: applied.status,
                })
            }
            WebhookEvent::Refunded { reference } => self.record_refund(gateway, reference).await,
            WebhookEvent::Ignored { event } => {
                tracing::info!(gateway = %gateway, event = %event, "webhook event ignored");
                Ok(WebhookAck::Ignored { event })
            }
        }
    }

    pub async fn apply_outcome(
        &self,
        payment: Payment,
        outcome: NormalizedOutcome,
    ) -> Result<Payment, PaymentError> {
        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let update = payment.resolve_outcome(&outcome);
        if update.amount_mismatch {
            tracing::warn!(
                target: "security",
                reference = %payment.reference,
                gateway = %payment.gateway,
                expected_minor = payment.amount_minor,
                reported_minor = outcome.amount_minor,
                gateway_reported_success = outcome.succeeded,
                "amount mismatch on payment outcome"
            );
        }

        let Some(mut settled) = self.ledger.settle(&payment.reference, &update).await? else {
            tracing::info!(reference = %payment.reference, "outcome already applied by a concurrent caller");
            return self
                .ledger
                .find_by_reference(&payment.reference)
                .await?
                .ok_or_else(|| PaymentError::NotFound(format!("payment {} not found", payment.reference)));
        };

        tracing::info!(
            reference = %settled.reference,
            gateway = %settled.gateway,
            status = %settled.status,
            "payment outcome applied"
        );

        if settled.status == PaymentStatus::Success {
            match self.confirm_booking(&settled).await {
                Ok(at) => settled.booking_confirmed_at = Some(at),
                Err(e) => tracing::error!(
                    reference = %settled.reference,
                    booking_id = %settled.booking_id,
                    "booking confirmation failed, left for reconciliation: {}",
                    e
                ),
            }
        }

        Ok(settled)
    }

    /// A `Conflict` from the booking side is final and is recorded on the payment.
    pub async fn confirm_booking(&self, payment: &Payment) -> Result<DateTime<Utc>, PaymentError> {
        if let Err(e) = self.bookings.confirm(payment.booking_id).await {
            if let PaymentError::Conflict(reason) = &e {
                self.ledger
                    .mark_booking_unconfirmable(&payment.reference, reason)
                    .await?;
                tracing::error!(
                    reference = %payment.reference,
                    booking_id = %payment.booking_id,
                    "paid booking cannot be confirmed: {}",
                    reason
                );
            }
            return Err(e);
        }
        let at = Utc::now();
        self.ledger
            .mark_booking_confirmed(&payment.reference, at)
            .await?;
        tracing::info!(reference = %payment.reference, booking_id = %payment.booking_id, "booking confirmed");
        Ok(at)
    }

    pub async fn abandon(&self, payment: &Payment) -> Result<Option<Payment>, PaymentError> {
        let changed = self
            .ledger
            .transition(&payment.reference, PaymentStatus::Pending, PaymentStatus::Abandoned)
            .await?;
        if changed.is_some() {
            tracing::info!(reference = %payment.reference, "pending payment abandoned");
        }
        Ok(changed)
    }

    async fn record_refund(
        &self,
        gateway: GatewayKind,
        reference: String,
    ) -> Result<WebhookAck, PaymentError> {
        let Some(payment) = self.ledger.find_by_reference(&reference).await? else {
            tracing::warn!(gateway = %gateway, reference = %reference, "refund for unknown payment");
            return Ok(WebhookAck::UnknownReference { reference });
        };
        if payment.gateway != gateway {
            tracing::warn!(
                target: "security",
                gateway = %gateway,
                reference = %reference,
                "refund gateway does not match payment gateway"
            );
            return Ok(WebhookAck::UnknownReference { reference });
        }

        match payment.status {
            PaymentStatus::Success => {
                let status = match self
                    .ledger
                    .transition(&reference, PaymentStatus::Success, PaymentStatus::Refunded)
                    .await?
                {
                    Some(p) => p.status,
                    None => self
                        .ledger
                        .find_by_reference(&reference)
                        .await?
                        .map(|p| p.status)
                        .unwrap_or(PaymentStatus::Refunded),
                };
                tracing::info!(reference = %reference, "refund recorded");
                Ok(WebhookAck::Applied { reference, status })
            }
            PaymentStatus::Refunded => Ok(WebhookAck::Applied {
                reference,
                status: PaymentStatus::Refunded,
            }),
            other => {
                tracing::warn!(reference = %reference, status = %other, "refund for payment that never succeeded");
                Ok(WebhookAck::Ignored {
                    event: "refund".to_string(),
                })
            }
        }
    }
}
