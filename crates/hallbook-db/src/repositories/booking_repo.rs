//! Booking repository implementation
//!
//! Provides PostgreSQL-backed storage for bookings. The conflict-checked
//! insert serializes writers per `(venue, date)` with a transaction-scoped
//! advisory lock, so writers for different venues or dates never wait on
//! each other. The `bookings_no_overlap` exclusion constraint backs it up.

use crate::error::map_sqlx_error;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use hallbook_core::{
    models::{Booking, BookingStatus, BookingTransition, PaymentRecord, PaymentStatus},
    traits::BookingRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Column list shared by every booking query
macro_rules! booking_columns {
    () => {
        "id, venue_id, customer_id, booking_date, start_time, end_time, total_amount, \
         status, payment_status, payment_id, payment_signature, payment_verified_at, \
         payment_attempts, idempotency_key, expires_at, created_at, updated_at, cancelled_at"
    };
}

/// PostgreSQL implementation of BookingRepository
pub struct PgBookingRepository {
    pool: PgPool,
    store_timeout: Duration,
}

impl PgBookingRepository {
    /// Create a new booking repository
    ///
    /// `store_timeout` bounds lock waits and statements of every write.
    pub fn new(pool: PgPool, store_timeout: Duration) -> Self {
        Self {
            pool,
            store_timeout,
        }
    }

    /// Parse booking status from string
    fn parse_status(s: &str) -> BookingStatus {
        BookingStatus::from_str(s).unwrap_or(BookingStatus::Cancelled)
    }

    /// Parse payment status from string
    fn parse_payment_status(s: &str) -> PaymentStatus {
        PaymentStatus::from_str(s).unwrap_or(PaymentStatus::Failed)
    }

    /// Begin a write transaction with lock and statement timeouts applied
    async fn begin_write(&self, context: &str) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(context, e))?;

        let timeout = format!("{}ms", self.store_timeout.as_millis());
        sqlx::query(
            "SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $1, true)",
        )
        .bind(&timeout)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(context, e))?;

        Ok(tx)
    }

    async fn commit(tx: Transaction<'static, Postgres>, context: &str) -> AppResult<()> {
        tx.commit().await.map_err(|e| match map_sqlx_error(context, e) {
            AppError::Database(msg) => AppError::Transaction(msg),
            other => other,
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        debug!("Finding booking by id: {}", id);

        let row = sqlx::query_as::<Postgres, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find booking", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_idempotency_key(
        &self,
        customer_id: i32,
        key: &str,
    ) -> AppResult<Option<Booking>> {
        let row = sqlx::query_as::<Postgres, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE customer_id = $1 AND idempotency_key = $2"
        ))
        .bind(customer_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find booking by idempotency key", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_holding_for_date(
        &self,
        venue_id: i32,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        self.find_holding_in_range(venue_id, date, date, now).await
    }

    #[instrument(skip(self))]
    async fn find_holding_in_range(
        &self,
        venue_id: i32,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<Postgres, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            r#"
            FROM bookings
            WHERE venue_id = $1
                AND booking_date BETWEEN $2 AND $3
                AND (status = 'confirmed' OR (status = 'pending' AND expires_at > $4))
            ORDER BY booking_date, start_time
            "#
        ))
        .bind(venue_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load holding bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, booking), fields(venue_id = booking.venue_id, date = %booking.booking_date))]
    async fn insert_if_free(&self, booking: &Booking) -> AppResult<Booking> {
        const CONTEXT: &str = "insert booking";

        let mut tx = self.begin_write(CONTEXT).await?;

        // Serialize writers for this venue and date
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(booking.venue_id)
            .bind(booking.booking_date.num_days_from_ce())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(CONTEXT, e))?;

        let expired = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled',
                payment_status = 'failed',
                cancelled_at = NOW(),
                updated_at = NOW()
            WHERE venue_id = $1
                AND booking_date = $2
                AND status = 'pending'
                AND expires_at <= $3
            "#,
        )
        .bind(booking.venue_id)
        .bind(booking.booking_date)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(CONTEXT, e))?
        .rows_affected();

        if expired > 0 {
            info!(expired, "Released expired pending bookings before insert");
        }

        let overlapping: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM bookings
            WHERE venue_id = $1
                AND booking_date = $2
                AND status <> 'cancelled'
                AND start_time < $4
                AND $3 < end_time
            LIMIT 1
            "#,
        )
        .bind(booking.venue_id)
        .bind(booking.booking_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(CONTEXT, e))?;

        if let Some((existing,)) = overlapping {
            debug!("Range overlaps booking {}", existing);
            // Keep the expiry cleanup
            Self::commit(tx, CONTEXT).await?;
            return Err(AppError::Conflict(format!(
                "{} {}-{} overlaps booking {}",
                booking.booking_date, booking.start_time, booking.end_time, existing
            )));
        }

        let row = sqlx::query_as::<Postgres, BookingRow>(concat!(
            r#"
            INSERT INTO bookings (
                id, venue_id, customer_id, booking_date, start_time, end_time,
                total_amount, status, payment_status, payment_attempts,
                idempotency_key, expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING "#,
            booking_columns!()
        ))
        .bind(booking.id)
        .bind(booking.venue_id)
        .bind(booking.customer_id)
        .bind(booking.booking_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.total_amount)
        .bind(booking.status.to_string())
        .bind(booking.payment_status.to_string())
        .bind(booking.payment_attempts)
        .bind(booking.idempotency_key.as_deref())
        .bind(booking.expires_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(CONTEXT, e))?;

        Self::commit(tx, CONTEXT).await?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_by_customer(&self, customer_id: i32) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<Postgres, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE customer_id = $1 ORDER BY booking_date DESC, start_time DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list customer bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_by_venue(&self, venue_id: i32) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<Postgres, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE venue_id = $1 ORDER BY booking_date DESC, start_time DESC"
        ))
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list venue bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<Postgres, BookingRow>(concat!(
            "SELECT ",
            booking_columns!(),
            r#"
            FROM bookings
            WHERE booking_date BETWEEN $1 AND $2
                AND status <> 'cancelled'
            ORDER BY booking_date, start_time, venue_id
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list calendar bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, transition))]
    async fn apply_transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        transition: &BookingTransition,
    ) -> AppResult<Booking> {
        const CONTEXT: &str = "update booking";

        let mut tx = self.begin_write(CONTEXT).await?;

        let payment = transition.payment.as_ref();
        let row = sqlx::query_as::<Postgres, BookingRow>(concat!(
            r#"
            UPDATE bookings
            SET status = CASE
                    WHEN $4::int IS NOT NULL AND payment_attempts + 1 >= $4 THEN 'cancelled'
                    ELSE $2
                END,
                payment_status = $3,
                payment_attempts = payment_attempts + CASE WHEN $4::int IS NULL THEN 0 ELSE 1 END,
                payment_id = COALESCE(payment_id, $5),
                payment_signature = CASE WHEN payment_id IS NULL THEN $6 ELSE payment_signature END,
                payment_verified_at = CASE WHEN payment_id IS NULL THEN $7 ELSE payment_verified_at END,
                cancelled_at = CASE
                    WHEN $2 = 'cancelled' OR ($4::int IS NOT NULL AND payment_attempts + 1 >= $4)
                        THEN COALESCE(cancelled_at, NOW())
                    ELSE cancelled_at
                END,
                updated_at = NOW()
            WHERE id = $1 AND status = $8
            RETURNING "#,
            booking_columns!()
        ))
        .bind(id)
        .bind(transition.status.to_string())
        .bind(transition.payment_status.to_string())
        .bind(transition.failed_attempt_limit)
        .bind(payment.map(|p| p.payment_id.as_str()))
        .bind(payment.map(|p| p.signature.as_str()))
        .bind(payment.map(|p| p.verified_at))
        .bind(expected.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(CONTEXT, e))?;

        let Some(row) = row else {
            let current: Option<(String,)> =
                sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(CONTEXT, e))?;

            return Err(match current {
                None => AppError::BookingNotFound(id.to_string()),
                Some((status,)) => AppError::InvalidState(format!(
                    "booking {} is {}, expected {}",
                    id, status, expected
                )),
            });
        };

        Self::commit(tx, CONTEXT).await?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn expire_stale_pending(&self, now: DateTime<Utc>) -> AppResult<Vec<Booking>> {
        const CONTEXT: &str = "expire pending bookings";

        let mut tx = self.begin_write(CONTEXT).await?;

        let rows = sqlx::query_as::<Postgres, BookingRow>(concat!(
            r#"
            UPDATE bookings
            SET status = 'cancelled',
                payment_status = 'failed',
                cancelled_at = NOW(),
                updated_at = NOW()
            WHERE status = 'pending'
                AND expires_at <= $1
            RETURNING "#,
            booking_columns!()
        ))
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(CONTEXT, e))?;

        Self::commit(tx, CONTEXT).await?;

        if !rows.is_empty() {
            warn!("Expired {} unpaid pending bookings", rows.len());
        }

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    venue_id: i32,
    customer_id: i32,
    booking_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    total_amount: Decimal,
    status: String,
    payment_status: String,
    payment_id: Option<String>,
    payment_signature: Option<String>,
    payment_verified_at: Option<DateTime<Utc>>,
    payment_attempts: i32,
    idempotency_key: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        let payment = match (row.payment_id, row.payment_signature, row.payment_verified_at) {
            (Some(payment_id), Some(signature), Some(verified_at)) => Some(PaymentRecord {
                payment_id,
                signature,
                verified_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            venue_id: row.venue_id,
            customer_id: row.customer_id,
            booking_date: row.booking_date,
            start_time: row.start_time,
            end_time: row.end_time,
            total_amount: row.total_amount,
            status: PgBookingRepository::parse_status(&row.status),
            payment_status: PgBookingRepository::parse_payment_status(&row.payment_status),
            payment,
            payment_attempts: row.payment_attempts,
            idempotency_key: row.idempotency_key,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(
            PgBookingRepository::parse_status("confirmed"),
            BookingStatus::Confirmed
        );
        assert_eq!(
            PgBookingRepository::parse_payment_status("completed"),
            PaymentStatus::Completed
        );
    }

    #[test]
    fn test_row_without_full_payment_has_no_record() {
        let now = Utc::now();
        let row = BookingRow {
            id: Uuid::new_v4(),
            venue_id: 1,
            customer_id: 2,
            booking_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            total_amount: Decimal::from(300),
            status: "pending".to_string(),
            payment_status: "failed".to_string(),
            payment_id: Some("pay_1".to_string()),
            payment_signature: None,
            payment_verified_at: None,
            payment_attempts: 1,
            idempotency_key: None,
            expires_at: now,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };

        let booking: Booking = row.into();
        assert!(booking.payment.is_none());
        assert_eq!(booking.payment_status, PaymentStatus::Failed);
    }
}
