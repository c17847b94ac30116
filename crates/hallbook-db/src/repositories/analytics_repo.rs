//! Analytics rollups over the bookings table
//!
//! Plain aggregate reads; they take no locks and never block writers.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hallbook_core::{
    models::{MonthlyRevenue, PaymentFunnel, VenueBookingCount, VenueRevenue},
    traits::AnalyticsRepository,
    AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use tracing::instrument;

/// PostgreSQL implementation of AnalyticsRepository
pub struct PgAnalyticsRepository {
    pool: PgPool,
}

impl PgAnalyticsRepository {
    /// Create a new analytics repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsRepository for PgAnalyticsRepository {
    #[instrument(skip(self))]
    async fn total_revenue(&self) -> AppResult<Decimal> {
        let (total,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_amount), 0) FROM bookings WHERE status = 'confirmed'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("sum revenue", e))?;

        Ok(total)
    }

    #[instrument(skip(self))]
    async fn monthly_revenue(&self, year: i32) -> AppResult<Vec<MonthlyRevenue>> {
        let rows = sqlx::query_as::<Postgres, MonthlyRow>(
            r#"
            SELECT
                EXTRACT(MONTH FROM booking_date)::int AS month,
                COALESCE(SUM(total_amount), 0) AS revenue,
                COUNT(*) AS bookings
            FROM bookings
            WHERE status = 'confirmed'
                AND booking_date >= make_date($1, 1, 1)
                AND booking_date < make_date($1 + 1, 1, 1)
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("aggregate monthly revenue", e))?;

        Ok(rows
            .into_iter()
            .map(|row| MonthlyRevenue {
                month: row.month as u32,
                revenue: row.revenue,
                bookings: row.bookings,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn revenue_by_venue(&self) -> AppResult<Vec<VenueRevenue>> {
        let rows = sqlx::query_as::<Postgres, VenueTotalsRow>(
            r#"
            SELECT
                b.venue_id,
                COALESCE(v.name, '') AS venue_name,
                COALESCE(SUM(b.total_amount), 0) AS revenue,
                COUNT(*) AS bookings
            FROM bookings b
            LEFT JOIN venues v ON v.id = b.venue_id
            WHERE b.status = 'confirmed'
            GROUP BY b.venue_id, v.name
            ORDER BY revenue DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("aggregate revenue by venue", e))?;

        Ok(rows
            .into_iter()
            .map(|row| VenueRevenue {
                venue_id: row.venue_id,
                venue_name: row.venue_name,
                revenue: row.revenue,
                bookings: row.bookings,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn bookings_by_venue(&self) -> AppResult<Vec<VenueBookingCount>> {
        let rows = sqlx::query_as::<Postgres, VenueTotalsRow>(
            r#"
            SELECT
                b.venue_id,
                COALESCE(v.name, '') AS venue_name,
                COALESCE(SUM(b.total_amount), 0) AS revenue,
                COUNT(*) AS bookings
            FROM bookings b
            LEFT JOIN venues v ON v.id = b.venue_id
            WHERE b.status <> 'cancelled'
            GROUP BY b.venue_id, v.name
            ORDER BY bookings DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count bookings by venue", e))?;

        Ok(rows
            .into_iter()
            .map(|row| VenueBookingCount {
                venue_id: row.venue_id,
                venue_name: row.venue_name,
                bookings: row.bookings,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn payment_funnel(&self) -> AppResult<PaymentFunnel> {
        let row = sqlx::query_as::<Postgres, FunnelRow>(
            r#"
            SELECT
                COUNT(*) AS total_payments,
                COUNT(*) FILTER (WHERE payment_status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE payment_status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE payment_status = 'failed') AS failed
            FROM bookings
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count payment funnel", e))?;

        Ok(PaymentFunnel {
            total_payments: row.total_payments,
            completed: row.completed,
            pending: row.pending,
            failed: row.failed,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MonthlyRow {
    month: i32,
    revenue: Decimal,
    bookings: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct VenueTotalsRow {
    venue_id: i32,
    venue_name: String,
    revenue: Decimal,
    bookings: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct FunnelRow {
    total_payments: i64,
    completed: i64,
    pending: i64,
    failed: i64,
}
