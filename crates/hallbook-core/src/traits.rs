//! Common traits for repositories and services
//!
//! Defines abstractions for storage, caching and payment verification.
//! Engine-facing traits are object safe so handlers can share them behind
//! `Arc<dyn ...>`.

use crate::error::AppError;
use crate::models::{
    Booking, BookingStatus, BookingTransition, MonthlyRevenue, PaymentFunnel, Venue,
    VenueBookingCount, VenuePricing, VenueRevenue,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Booking storage with an atomic conflict-checked insert
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Find booking by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError>;

    /// Find a customer's booking by idempotency key
    async fn find_by_idempotency_key(
        &self,
        customer_id: i32,
        key: &str,
    ) -> Result<Option<Booking>, AppError>;

    /// Bookings holding a slot at `now` for a venue and date
    async fn find_holding_for_date(
        &self,
        venue_id: i32,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;

    /// Bookings holding a slot at `now` for a venue within `[from, to]`
    async fn find_holding_in_range(
        &self,
        venue_id: i32,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;

    /// Insert `booking` unless a booking holding an overlapping range exists
    /// for the same venue and date.
    ///
    /// Expired pending bookings in the way are cancelled first. Returns
    /// `Conflict` on overlap, `AlreadyExists` when the customer's idempotency
    /// key is taken and `Unavailable` when the critical section cannot be
    /// entered in time.
    async fn insert_if_free(&self, booking: &Booking) -> Result<Booking, AppError>;

    /// A customer's bookings, newest date first
    async fn list_by_customer(&self, customer_id: i32) -> Result<Vec<Booking>, AppError>;

    /// A venue's bookings, newest date first
    async fn list_by_venue(&self, venue_id: i32) -> Result<Vec<Booking>, AppError>;

    /// Non-cancelled bookings of all venues within `[from, to]`, ascending
    async fn list_between(&self, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Booking>, AppError>;

    /// Apply `transition` if the booking is still in `expected` status
    ///
    /// Returns `InvalidState` when the status moved underneath the caller.
    async fn apply_transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        transition: &BookingTransition,
    ) -> Result<Booking, AppError>;

    /// Cancel every pending booking whose payment window closed before `now`
    async fn expire_stale_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
}

/// Venue catalog as seen by the engine
#[async_trait]
pub trait VenueCatalog: Send + Sync {
    async fn find_venue(&self, id: i32) -> Result<Option<Venue>, AppError>;

    async fn list_venues(&self) -> Result<Vec<Venue>, AppError>;

    /// Update rates and capacity; existing booking totals are untouched
    async fn update_pricing(&self, id: i32, pricing: &VenuePricing) -> Result<Venue, AppError>;
}

/// Read-only rollups over the booking store
///
/// Venue names may be empty; the analytics service resolves them.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Sum of confirmed booking totals
    async fn total_revenue(&self) -> Result<Decimal, AppError>;

    /// Confirmed revenue per month of `year`; months without revenue may be absent
    async fn monthly_revenue(&self, year: i32) -> Result<Vec<MonthlyRevenue>, AppError>;

    /// Confirmed revenue per venue
    async fn revenue_by_venue(&self) -> Result<Vec<VenueRevenue>, AppError>;

    /// Non-cancelled booking count per venue
    async fn bookings_by_venue(&self) -> Result<Vec<VenueBookingCount>, AppError>;

    /// Booking count per payment status
    async fn payment_funnel(&self) -> Result<PaymentFunnel, AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
}

/// Rolling cache of a venue's available dates, invalidated on booking writes
///
/// Every invalidation bumps a per-venue generation. Readers take the
/// generation before scanning the store and write back under it, so a list
/// computed before a concurrent write never replaces the invalidation.
#[async_trait]
pub trait AvailabilityCache: Send + Sync {
    async fn get_available_dates(&self, venue_id: i32)
        -> Result<Option<Vec<NaiveDate>>, AppError>;

    /// Current invalidation generation of a venue, `0` if never invalidated
    async fn generation(&self, venue_id: i32) -> Result<u64, AppError>;

    /// Store `dates` unless the venue was invalidated after `generation`
    ///
    /// Returns whether the dates were stored.
    async fn set_available_dates(
        &self,
        venue_id: i32,
        generation: u64,
        dates: &[NaiveDate],
        ttl_secs: u64,
    ) -> Result<bool, AppError>;

    /// Bump the venue's generation and drop its cached dates
    async fn invalidate_venue(&self, venue_id: i32) -> Result<(), AppError>;
}

/// Checks a gateway-supplied proof against a booking
pub trait PaymentVerifier: Send + Sync {
    fn verify(&self, booking: &Booking, payment_id: &str, signature: &str) -> bool;
}
