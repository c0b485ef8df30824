use crate::domain::booking::{BookingSnapshot, BookingStatus};
use crate::error::PaymentError;
use anyhow::anyhow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait BookingGate: Send + Sync {
    async fn load(&self, booking_id: Uuid) -> anyhow::Result<Option<BookingSnapshot>>;

    /// Idempotent: confirming a confirmed booking succeeds without changes.
    async fn confirm(&self, booking_id: Uuid) -> Result<(), PaymentError>;
}

#[derive(Clone)]
pub struct BookingsRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl BookingGate for BookingsRepo {
    async fn load(&self, booking_id: Uuid) -> anyhow::Result<Option<BookingSnapshot>> {
        let row = sqlx::query("SELECT id, user_id, status, total_amount FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        let status: String = r.try_get("status")?;

        Ok(Some(BookingSnapshot {
            id: r.try_get("id")?,
            user_id: r.try_get("user_id")?,
            status: BookingStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown booking status {}", status))?,
            total_amount: r.try_get("total_amount")?,
        }))
    }

    async fn confirm(&self, booking_id: Uuid) -> Result<(), PaymentError> {
        let res = sqlx::query(
            "UPDATE bookings SET status = 'CONFIRMED', confirmed_at = now(), updated_at = now() WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PaymentError::Internal(e.into()))?;

        if res.rows_affected() == 1 {
            return Ok(());
        }

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PaymentError::Internal(e.into()))?;

        match status.as_deref() {
            None => Err(PaymentError::NotFound(format!("booking {} not found", booking_id))),
            Some("CONFIRMED") => Ok(()),
            Some(other) => Err(PaymentError::Conflict(format!(
                "booking {} cannot be confirmed from {}",
                booking_id, other
            ))),
        }
    }
}
