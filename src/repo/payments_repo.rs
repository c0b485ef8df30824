use crate::domain::payment::{GatewayKind, OutcomeUpdate, Payment, PaymentStatus};
use crate::error::PaymentError;
use crate::repo::outbox_repo::OutboxRepo;
use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn insert_pending(&self, payment: &Payment) -> Result<(), PaymentError>;

    async fn find_by_reference(&self, reference: &str) -> anyhow::Result<Option<Payment>>;

    async fn find_open_for_booking(&self, booking_id: Uuid) -> anyhow::Result<Option<Payment>>;

    /// Applies an outcome if the payment is still PENDING. `None` means another
    /// writer got there first.
    async fn settle(&self, reference: &str, update: &OutcomeUpdate)
        -> anyhow::Result<Option<Payment>>;

    async fn transition(
        &self,
        reference: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> anyhow::Result<Option<Payment>>;

    async fn mark_booking_confirmed(&self, reference: &str, at: DateTime<Utc>)
        -> anyhow::Result<()>;

    async fn mark_booking_unconfirmable(&self, reference: &str, reason: &str)
        -> anyhow::Result<()>;

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Payment>>;

    async fn list_unconfirmed_successes(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Payment>>;
}

const PAYMENT_COLUMNS: &str = "id, gateway_reference, gateway, booking_id, user_id, amount_minor, currency, status, \
     payment_method, authorization_code, gateway_fees_minor, failure_reason, paid_at, \
     raw_gateway_payload, booking_confirmed_at, booking_confirm_error, created_at, updated_at";

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

impl PaymentsRepo {
    async fn record_event_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> anyhow::Result<()> {
        OutboxRepo::insert_tx(
            tx,
            payment.id,
            &payment.reference,
            &format!("payment.{}", payment.status.as_str().to_lowercase()),
            serde_json::json!({
                "payment_id": payment.id,
                "reference": payment.reference,
                "gateway": payment.gateway,
                "booking_id": payment.booking_id,
                "user_id": payment.user_id,
                "amount_minor": payment.amount_minor,
                "currency": payment.currency,
                "status": payment.status,
                "failure_reason": payment.failure_reason,
                "paid_at": payment.paid_at,
            }),
        )
        .await
    }
}

#[async_trait::async_trait]
impl PaymentLedger for PaymentsRepo {
    async fn insert_pending(&self, payment: &Payment) -> Result<(), PaymentError> {
        let res = sqlx::query(
            r#"
            INSERT INTO payments (
                id, gateway_reference, gateway, booking_id, user_id, amount_minor, currency,
                status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8, $8)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.reference)
        .bind(payment.gateway.as_str())
        .bind(payment.booking_id)
        .bind(payment.user_id)
        .bind(payment.amount_minor)
        .bind(&payment.currency)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(PaymentError::Conflict(format!(
                    "booking {} already has a payment in progress or completed",
                    payment.booking_id
                )))
            }
            Err(e) => Err(PaymentError::Internal(e.into())),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> anyhow::Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE gateway_reference = $1",
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_open_for_booking(&self, booking_id: Uuid) -> anyhow::Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 AND status IN ('PENDING', 'SUCCESS') LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn settle(
        &self,
        reference: &str,
        update: &OutcomeUpdate,
    ) -> anyhow::Result<Option<Payment>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2, payment_method = $3, authorization_code = $4, gateway_fees_minor = $5,
                failure_reason = $6, paid_at = $7, raw_gateway_payload = $8, updated_at = now()
            WHERE gateway_reference = $1 AND status = 'PENDING'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .bind(update.status.as_str())
        .bind(&update.payment_method)
        .bind(&update.authorization_code)
        .bind(update.gateway_fees_minor)
        .bind(&update.failure_reason)
        .bind(update.paid_at)
        .bind(&update.raw_payload)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let payment = payment_from_row(&row)?;
        Self::record_event_tx(&mut tx, &payment).await?;
        tx.commit().await?;
        Ok(Some(payment))
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

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments SET status = $3, updated_at = now()
            WHERE gateway_reference = $1 AND status = $2
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let payment = payment_from_row(&row)?;
        Self::record_event_tx(&mut tx, &payment).await?;
        tx.commit().await?;
        Ok(Some(payment))
    }

    async fn mark_booking_confirmed(
        &self,
        reference: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE payments SET booking_confirmed_at = $2, updated_at = now() WHERE gateway_reference = $1 AND booking_confirmed_at IS NULL",
        )
        .bind(reference)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_booking_unconfirmable(&self, reference: &str, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE payments SET booking_confirm_error = $2, updated_at = now() WHERE gateway_reference = $1 AND booking_confirmed_at IS NULL",
        )
        .bind(reference)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE status = 'PENDING' AND created_at <= $1 ORDER BY created_at ASC LIMIT $2",
            PAYMENT_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payment_from_row).collect()
    }

    async fn list_unconfirmed_successes(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE status = 'SUCCESS' AND booking_confirmed_at IS NULL AND booking_confirm_error IS NULL AND updated_at <= $1 ORDER BY updated_at ASC LIMIT $2",
            PAYMENT_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payment_from_row).collect()
    }
}

fn payment_from_row(r: &PgRow) -> anyhow::Result<Payment> {
    let gateway: String = r.try_get("gateway")?;
    let status: String = r.try_get("status")?;

    Ok(Payment {
        id: r.try_get("id")?,
        reference: r.try_get("gateway_reference")?,
        gateway: GatewayKind::parse(&gateway).ok_or_else(|| anyhow!("unknown gateway {}", gateway))?,
        booking_id: r.try_get("booking_id")?,
        user_id: r.try_get("user_id")?,
        amount_minor: r.try_get("amount_minor")?,
        currency: r.try_get("currency")?,
        status: PaymentStatus::parse(&status).ok_or_else(|| anyhow!("unknown status {}", status))?,
        payment_method: r.try_get("payment_method")?,
        authorization_code: r.try_get("authorization_code")?,
        gateway_fees_minor: r.try_get("gateway_fees_minor")?,
        failure_reason: r.try_get("failure_reason")?,
        paid_at: r.try_get("paid_at")?,
        raw_gateway_payload: r.try_get("raw_gateway_payload")?,
        booking_confirmed_at: r.try_get("booking_confirmed_at")?,
        booking_confirm_error: r.try_get("booking_confirm_error")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}
