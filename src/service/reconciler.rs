use crate::domain::payment::Payment;
use crate::error::PaymentError;
use crate::gateways::GatewayVerification;
use crate::service::payment_service::PaymentService;
use anyhow::Result;
use chrono::{Duration, Utc};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub settled: usize,
    pub abandoned: usize,
    pub still_pending: usize,
    pub bookings_confirmed: usize,
    pub bookings_unconfirmable: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct PendingReconciler {
    pub service: PaymentService,
    pub min_age: Duration,
    pub pending_ttl: Duration,
    pub batch_size: i64,
}

impl PendingReconciler {
    pub fn new(service: PaymentService, pending_ttl_minutes: i64) -> Self {
        Self {
            service,
            min_age: Duration::minutes(1),
            pending_ttl: Duration::minutes(pending_ttl_minutes.max(1)),
            batch_size: 100,
        }
    }

    pub async fn run(self, interval: std::time::Duration) {
        loop {
            match self.tick().await {
                Ok(report) if report != ReconcileReport::default() => {
                    tracing::info!(
                        settled = report.settled,
                        abandoned = report.abandoned,
                        still_pending = report.still_pending,
                        bookings_confirmed = report.bookings_confirmed,
                        bookings_unconfirmable = report.bookings_unconfirmable,
                        errors = report.errors,
                        "reconciliation pass finished"
                    );
                }
                Ok(_) => {}
                Err(err) => tracing::error!("reconciler error: {}", err),
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn tick(&self) -> Result<ReconcileReport> {
        let now = Utc::now();
        let mut report = ReconcileReport::default();

        let pending = self
            .service
            .ledger
            .list_pending_before(now - self.min_age, self.batch_size)
            .await?;
        for payment in pending {
            let expired = payment.created_at <= now - self.pending_ttl;
            match self.reconcile_pending(&payment, expired).await {
                Ok(Reconciled::Settled) => report.settled += 1,
                Ok(Reconciled::Abandoned) => report.abandoned += 1,
                Ok(Reconciled::StillPending) => report.still_pending += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(reference = %payment.reference, "reconcile failed: {}", e);
                }
            }
        }

        let unconfirmed = self
            .service
            .ledger
            .list_unconfirmed_successes(now - self.min_age, self.batch_size)
            .await?;
        for payment in unconfirmed {
            match self.service.confirm_booking(&payment).await {
                Ok(_) => report.bookings_confirmed += 1,
                Err(PaymentError::Conflict(_)) => report.bookings_unconfirmable += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        reference = %payment.reference,
                        booking_id = %payment.booking_id,
                        "booking still unconfirmed: {}",
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_pending(
        &self,
        payment: &Payment,
        expired: bool,
    ) -> Result<Reconciled, PaymentError> {
        let adapter = self.service.gateways.resolve(payment.gateway)?;
        match adapter.verify(&payment.reference).await? {
            GatewayVerification::Settled(outcome) => {
                self.service.apply_outcome(payment.clone(), outcome).await?;
                Ok(Reconciled::Settled)
            }
            GatewayVerification::InProgress { .. } if expired => {
                match self.service.abandon(payment).await? {
                    Some(_) => Ok(Reconciled::Abandoned),
                    None => Ok(Reconciled::Settled),
                }
            }
            GatewayVerification::InProgress { .. } => Ok(Reconciled::StillPending),
        }
    }
}

enum Reconciled {
    Settled,
    Abandoned,
    StillPending,
}
