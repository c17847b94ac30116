//! Venue catalog repository implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::NaiveTime;
use hallbook_core::{
    models::{Venue, VenuePricing},
    traits::VenueCatalog,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use tracing::{debug, info, instrument};

/// PostgreSQL implementation of VenueCatalog
pub struct PgVenueRepository {
    pool: PgPool,
}

impl PgVenueRepository {
    /// Create a new venue repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VenueCatalog for PgVenueRepository {
    #[instrument(skip(self))]
    async fn find_venue(&self, id: i32) -> AppResult<Option<Venue>> {
        debug!("Finding venue by id: {}", id);

        let row = sqlx::query_as::<Postgres, VenueRow>(
            r#"
            SELECT id, name, capacity, price_per_hour, price_per_day, location, opens_at, closes_at
            FROM venues
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find venue", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_venues(&self) -> AppResult<Vec<Venue>> {
        let rows = sqlx::query_as::<Postgres, VenueRow>(
            r#"
            SELECT id, name, capacity, price_per_hour, price_per_day, location, opens_at, closes_at
            FROM venues
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list venues", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn update_pricing(&self, id: i32, pricing: &VenuePricing) -> AppResult<Venue> {
        let row = sqlx::query_as::<Postgres, VenueRow>(
            r#"
            UPDATE venues
            SET price_per_hour = $2,
                price_per_day = $3,
                capacity = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, capacity, price_per_hour, price_per_day, location, opens_at, closes_at
            "#,
        )
        .bind(id)
        .bind(pricing.price_per_hour)
        .bind(pricing.price_per_day)
        .bind(pricing.capacity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update venue pricing", e))?
        .ok_or_else(|| AppError::VenueNotFound(id.to_string()))?;

        info!(
            "Venue {} pricing updated: {}/hour, {}/day",
            id, row.price_per_hour, row.price_per_day
        );

        Ok(row.into())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct VenueRow {
    id: i32,
    name: String,
    capacity: i32,
    price_per_hour: Decimal,
    price_per_day: Decimal,
    location: String,
    opens_at: NaiveTime,
    closes_at: NaiveTime,
}

impl From<VenueRow> for Venue {
    fn from(row: VenueRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            capacity: row.capacity,
            price_per_hour: row.price_per_hour,
            price_per_day: row.price_per_day,
            location: row.location,
            opens_at: row.opens_at,
            closes_at: row.closes_at,
        }
    }
}
