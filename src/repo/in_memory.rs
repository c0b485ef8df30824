use crate::domain::booking::{BookingSnapshot, BookingStatus};
use crate::domain::payment::{OutcomeUpdate, Payment, PaymentStatus};
use crate::error::PaymentError;
use crate::repo::bookings_repo::BookingGate;
use crate::repo::payments_repo::PaymentLedger;
use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct InMemoryLedger {
    payments: Arc<RwLock<HashMap<String, Payment>>>,
    events: Arc<RwLock<Vec<(String, String)>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Payment> {
        self.payments.read().await.values().cloned().collect()
    }

    pub async fn events(&self) -> Vec<(String, String)> {
        self.events.read().await.clone()
    }

    pub async fn set_created_at(&self, reference: &str, at: DateTime<Utc>) {
        if let Some(p) = self.payments.write().await.get_mut(reference) {
            p.created_at = at;
            p.updated_at = at;
        }
    }

    async fn record_event(&self, payment: &Payment) {
        self.events.write().await.push((
            payment.reference.clone(),
            format!("payment.{}", payment.status.as_str().to_lowercase()),
        ));
    }
}

#[async_trait]
impl PaymentLedger for InMemoryLedger {
    async fn insert_pending(&self, payment: &Payment) -> Result<(), PaymentError> {
        let mut payments = self.payments.write().await;
        let booking_held = payments
            .values()
            .any(|p| p.booking_id == payment.booking_id && p.status.holds_booking());
        if booking_held || payments.contains_key(&payment.reference) {
            return Err(PaymentError::Conflict(format!(
                "booking {} already has a payment in progress or completed",
                payment.booking_id
            )));
        }
        payments.insert(payment.reference.clone(), payment.clone());
        Ok(())
    }

    async fn find_by_reference(&self, reference: &str) -> anyhow::Result<Option<Payment>> {
        Ok(self.payments.read().await.get(reference).cloned())
    }

    async fn find_open_for_booking(&self, booking_id: Uuid) -> anyhow::Result<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.booking_id == booking_id && p.status.holds_booking())
            .cloned())
    }

    async fn settle(
        &self,
        reference: &str,
        update: &OutcomeUpdate,
    ) -> anyhow::Result<Option<Payment>> {
        let settled = {
            let mut payments = self.payments.write().await;
            let Some(p) = payments.get_mut(reference) else {
                return Ok(None);
            };
            if p.status != PaymentStatus::Pending {
                return Ok(None);
            }
            p.status = update.status;
            p.payment_method = update.payment_method.clone();
            p.authorization_code = update.authorization_code.clone();
            p.gateway_fees_minor = update.gateway_fees_minor;
            p.failure_reason = update.failure_reason.clone();
            p.paid_at = update.paid_at;
            p.raw_gateway_payload = Some(update.raw_payload.clone());
            p.updated_at = Utc::now();
            p.clone()
        };
        self.record_event(&settled).await;
        Ok(Some(settled))
    }

    async fn transition(
        &self,
        reference: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> anyhow::Result<Option<Payment>> {
        if !from.can_transition_to(to) {
            bail!("illegal payment transition {} -> {}", from, to);
        }
        let changed = {
            let mut payments = self.payments.write().await;
            match payments.get_mut(reference) {
                Some(p) if p.status == from => {
                    p.status = to;
                    p.updated_at = Utc::now();
                    p.clone()
                }
                _ => return Ok(None),
            }
        };
        self.record_event(&changed).await;
        Ok(Some(changed))
    }

    async fn mark_booking_confirmed(
        &self,
        reference: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(p) = self.payments.write().await.get_mut(reference) {
            if p.booking_confirmed_at.is_none() {
                p.booking_confirmed_at = Some(at);
            }
        }
        Ok(())
    }

    async fn mark_booking_unconfirmable(&self, reference: &str, reason: &str) -> anyhow::Result<()> {
        if let Some(p) = self.payments.write().await.get_mut(reference) {
            if p.booking_confirmed_at.is_none() {
                p.booking_confirm_error = Some(reason.to_string());
            }
        }
        Ok(())
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at <= cutoff)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn list_unconfirmed_successes(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| {
                p.status == PaymentStatus::Success
                    && p.booking_confirmed_at.is_none()
                    && p.booking_confirm_error.is_none()
                    && p.updated_at <= cutoff
            })
            .cloned()
            .collect();
        found.sort_by_key(|p| p.updated_at);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryBookings {
    bookings: Arc<RwLock<HashMap<Uuid, BookingSnapshot>>>,
    confirm_calls: Arc<RwLock<HashMap<Uuid, usize>>>,
    fail_confirms: Arc<RwLock<bool>>,
}

impl InMemoryBookings {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, booking: BookingSnapshot) {
        self.bookings.write().await.insert(booking.id, booking);
    }

    pub async fn get(&self, booking_id: Uuid) -> Option<BookingSnapshot> {
        self.bookings.read().await.get(&booking_id).cloned()
    }

    pub async fn confirm_calls(&self, booking_id: Uuid) -> usize {
        self.confirm_calls
            .read()
            .await
            .get(&booking_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.fail_confirms.write().await = unavailable;
    }
}

#[async_trait]
impl BookingGate for InMemoryBookings {
    async fn load(&self, booking_id: Uuid) -> anyhow::Result<Option<BookingSnapshot>> {
        Ok(self.get(booking_id).await)
    }

    async fn confirm(&self, booking_id: Uuid) -> Result<(), PaymentError> {
        *self
            .confirm_calls
            .write()
            .await
            .entry(booking_id)
            .or_insert(0) += 1;

        if *self.fail_confirms.read().await {
            return Err(PaymentError::Internal(anyhow::anyhow!("booking store unavailable")));
        }

        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&booking_id)
            .ok_or_else(|| PaymentError::NotFound(format!("booking {} not found", booking_id)))?;

        match booking.status {
            BookingStatus::Pending => {
                booking.status = BookingStatus::Confirmed;
                Ok(())
            }
            BookingStatus::Confirmed => Ok(()),
            BookingStatus::Cancelled => Err(PaymentError::Conflict(format!(
                "booking {} cannot be confirmed from CANCELLED",
                booking_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{GatewayKind, NewPayment};

    fn payment(booking_id: Uuid, reference: &str) -> Payment {
        Payment::pending(NewPayment {
            reference: reference.to_string(),
            gateway: GatewayKind::Paystack,
            booking_id,
            user_id: Uuid::new_v4(),
            amount_minor: 5000,
            currency: "NGN".to_string(),
        })
    }

    fn update(status: PaymentStatus) -> OutcomeUpdate {
        OutcomeUpdate {
            status,
            payment_method: Some("card".to_string()),
            authorization_code: None,
            gateway_fees_minor: None,
            failure_reason: None,
            paid_at: Some(Utc::now()),
            raw_payload: serde_json::json!({}),
            amount_mismatch: false,
        }
    }

    #[tokio::test]
    async fn second_open_payment_for_booking_conflicts() {
        let ledger = InMemoryLedger::new();
        let booking = Uuid::new_v4();
        ledger.insert_pending(&payment(booking, "A")).await.unwrap();
        let err = ledger.insert_pending(&payment(booking, "B")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_payment_frees_the_booking() {
        let ledger = InMemoryLedger::new();
        let booking = Uuid::new_v4();
        ledger.insert_pending(&payment(booking, "A")).await.unwrap();
        ledger.settle("A", &update(PaymentStatus::Failed)).await.unwrap();
        ledger.insert_pending(&payment(booking, "B")).await.unwrap();
    }

    #[tokio::test]
    async fn settle_only_applies_once() {
        let ledger = InMemoryLedger::new();
        ledger.insert_pending(&payment(Uuid::new_v4(), "A")).await.unwrap();
        assert!(ledger.settle("A", &update(PaymentStatus::Success)).await.unwrap().is_some());
        assert!(ledger.settle("A", &update(PaymentStatus::Failed)).await.unwrap().is_none());
        let stored = ledger.find_by_reference("A").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
        assert_eq!(ledger.events().await.len(), 1);
    }

    #[tokio::test]
    async fn illegal_transitions_are_refused() {
        let ledger = InMemoryLedger::new();
        ledger.insert_pending(&payment(Uuid::new_v4(), "A")).await.unwrap();
        assert!(ledger
            .transition("A", PaymentStatus::Failed, PaymentStatus::Success)
            .await
            .is_err());
        assert!(ledger
            .transition("A", PaymentStatus::Success, PaymentStatus::Refunded)
            .await
            .unwrap()
            .is_none());
    }
}
