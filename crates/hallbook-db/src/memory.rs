//! In-memory booking store and venue catalog
//!
//! Suitable for tests and single-process deployments; data is lost on
//! restart. The conflict-checked insert is serialized per `(venue, date)`
//! with a keyed lock acquired under a timeout, so inserts for different
//! venues or dates proceed independently. No guard is held across an await.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use hallbook_core::{
    models::{
        Booking, BookingStatus, BookingTransition, MonthlyRevenue, PaymentFunnel, PaymentStatus,
        Venue, VenueBookingCount, VenuePricing, VenueRevenue,
    },
    traits::{AnalyticsRepository, BookingRepository, VenueCatalog},
    AppError, AppResult,
};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default wait for a venue/date lock
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type DayKey = (i32, NaiveDate);

/// In-memory implementation of BookingRepository and AnalyticsRepository
#[derive(Clone)]
pub struct InMemoryBookingRepository {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
    day_locks: Arc<Mutex<HashMap<DayKey, Arc<Mutex<()>>>>>,
    lock_timeout: Duration,
}

impl InMemoryBookingRepository {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store whose inserts give up after `lock_timeout`
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            bookings: Arc::new(RwLock::new(HashMap::new())),
            day_locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout,
        }
    }

    /// Lock serializing writers of one venue and date
    fn day_lock(&self, venue_id: i32, date: NaiveDate) -> Arc<Mutex<()>> {
        self.day_locks
            .lock()
            .entry((venue_id, date))
            .or_default()
            .clone()
    }

    fn sorted_desc(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by(|a, b| {
            (b.booking_date, b.start_time, b.created_at).cmp(&(
                a.booking_date,
                a.start_time,
                a.created_at,
            ))
        });
        bookings
    }
}

impl Default for InMemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.bookings.read().get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        customer_id: i32,
        key: &str,
    ) -> AppResult<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .values()
            .find(|b| b.customer_id == customer_id && b.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_holding_for_date(
        &self,
        venue_id: i32,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        self.find_holding_in_range(venue_id, date, date, now).await
    }

    async fn find_holding_in_range(
        &self,
        venue_id: i32,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let mut holding: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| {
                b.venue_id == venue_id
                    && b.booking_date >= from
                    && b.booking_date <= to
                    && b.holds_slot(now)
            })
            .cloned()
            .collect();
        holding.sort_by_key(|b| (b.booking_date, b.start_time));
        Ok(holding)
    }

    async fn insert_if_free(&self, booking: &Booking) -> AppResult<Booking> {
        let day_lock = self.day_lock(booking.venue_id, booking.booking_date);
        let _guard = day_lock.try_lock_for(self.lock_timeout).ok_or_else(|| {
            warn!(
                venue_id = booking.venue_id,
                date = %booking.booking_date,
                "Timed out waiting for venue/date lock"
            );
            AppError::Unavailable(format!(
                "venue {} on {} is busy",
                booking.venue_id, booking.booking_date
            ))
        })?;

        let now = Utc::now();
        {
            let mut bookings = self.bookings.write();
            for stale in bookings.values_mut().filter(|b| {
                b.venue_id == booking.venue_id
                    && b.booking_date == booking.booking_date
                    && b.is_expired_pending(now)
            }) {
                BookingTransition::cancel(stale.payment_status).apply_to(stale, now);
                info!("Released expired pending booking {}", stale.id);
            }
        }

        let overlapping = self
            .bookings
            .read()
            .values()
            .find(|b| {
                b.venue_id == booking.venue_id
                    && b.booking_date == booking.booking_date
                    && b.status != BookingStatus::Cancelled
                    && b.overlaps(booking.start_time, booking.end_time)
            })
            .map(|b| b.id);

        if let Some(existing) = overlapping {
            debug!("Range overlaps booking {}", existing);
            return Err(AppError::Conflict(format!(
                "{} {}-{} overlaps booking {}",
                booking.booking_date, booking.start_time, booking.end_time, existing
            )));
        }

        let mut bookings = self.bookings.write();
        if let Some(key) = booking.idempotency_key.as_deref() {
            let taken = bookings.values().any(|b| {
                b.customer_id == booking.customer_id && b.idempotency_key.as_deref() == Some(key)
            });
            if taken {
                return Err(AppError::AlreadyExists(format!(
                    "idempotency key {} already used",
                    key
                )));
            }
        }
        if bookings.contains_key(&booking.id) {
            return Err(AppError::AlreadyExists(booking.id.to_string()));
        }
        bookings.insert(booking.id, booking.clone());

        Ok(booking.clone())
    }

    async fn list_by_customer(&self, customer_id: i32) -> AppResult<Vec<Booking>> {
        let bookings = self
            .bookings
            .read()
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(Self::sorted_desc(bookings))
    }

    async fn list_by_venue(&self, venue_id: i32) -> AppResult<Vec<Booking>> {
        let bookings = self
            .bookings
            .read()
            .values()
            .filter(|b| b.venue_id == venue_id)
            .cloned()
            .collect();
        Ok(Self::sorted_desc(bookings))
    }

    async fn list_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| {
                b.status != BookingStatus::Cancelled
                    && b.booking_date >= from
                    && b.booking_date <= to
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.booking_date, b.start_time, b.venue_id));
        Ok(bookings)
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        transition: &BookingTransition,
    ) -> AppResult<Booking> {
        let mut bookings = self.bookings.write();
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;

        if booking.status != expected {
            return Err(AppError::InvalidState(format!(
                "booking {} is {}, expected {}",
                id, booking.status, expected
            )));
        }

        transition.apply_to(booking, Utc::now());
        Ok(booking.clone())
    }

    async fn expire_stale_pending(&self, now: DateTime<Utc>) -> AppResult<Vec<Booking>> {
        let mut bookings = self.bookings.write();
        let expired: Vec<Booking> = bookings
            .values_mut()
            .filter(|b| b.is_expired_pending(now))
            .map(|b| {
                BookingTransition::cancel(b.payment_status).apply_to(b, now);
                b.clone()
            })
            .collect();

        if !expired.is_empty() {
            warn!("Expired {} unpaid pending bookings", expired.len());
        }
        Ok(expired)
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryBookingRepository {
    async fn total_revenue(&self) -> AppResult<Decimal> {
        Ok(self
            .bookings
            .read()
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .map(|b| b.total_amount)
            .sum())
    }

    async fn monthly_revenue(&self, year: i32) -> AppResult<Vec<MonthlyRevenue>> {
        let mut months: BTreeMap<u32, (Decimal, i64)> = BTreeMap::new();
        for b in self.bookings.read().values() {
            if b.status == BookingStatus::Confirmed && b.booking_date.year() == year {
                let entry = months.entry(b.booking_date.month()).or_default();
                entry.0 += b.total_amount;
                entry.1 += 1;
            }
        }
        Ok(months
            .into_iter()
            .map(|(month, (revenue, bookings))| MonthlyRevenue {
                month,
                revenue,
                bookings,
            })
            .collect())
    }

    async fn revenue_by_venue(&self) -> AppResult<Vec<VenueRevenue>> {
        let mut venues: BTreeMap<i32, (Decimal, i64)> = BTreeMap::new();
        for b in self.bookings.read().values() {
            if b.status == BookingStatus::Confirmed {
                let entry = venues.entry(b.venue_id).or_default();
                entry.0 += b.total_amount;
                entry.1 += 1;
            }
        }
        Ok(venues
            .into_iter()
            .map(|(venue_id, (revenue, bookings))| VenueRevenue {
                venue_id,
                venue_name: String::new(),
                revenue,
                bookings,
            })
            .collect())
    }

    async fn bookings_by_venue(&self) -> AppResult<Vec<VenueBookingCount>> {
        let mut venues: BTreeMap<i32, i64> = BTreeMap::new();
        for b in self.bookings.read().values() {
            if b.status != BookingStatus::Cancelled {
                *venues.entry(b.venue_id).or_default() += 1;
            }
        }
        Ok(venues
            .into_iter()
            .map(|(venue_id, bookings)| VenueBookingCount {
                venue_id,
                venue_name: String::new(),
                bookings,
            })
            .collect())
    }

    async fn payment_funnel(&self) -> AppResult<PaymentFunnel> {
        let mut funnel = PaymentFunnel::default();
        for b in self.bookings.read().values() {
            funnel.total_payments += 1;
            match b.payment_status {
                PaymentStatus::Completed => funnel.completed += 1,
                PaymentStatus::Pending => funnel.pending += 1,
                PaymentStatus::Failed => funnel.failed += 1,
            }
        }
        Ok(funnel)
    }
}

/// In-memory implementation of VenueCatalog
#[derive(Clone, Default)]
pub struct InMemoryVenueCatalog {
    venues: Arc<RwLock<BTreeMap<i32, Venue>>>,
}

impl InMemoryVenueCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with `venues`
    pub fn with_venues(venues: impl IntoIterator<Item = Venue>) -> Self {
        let catalog = Self::new();
        for venue in venues {
            catalog.insert(venue);
        }
        catalog
    }

    /// Add or replace a venue
    pub fn insert(&self, venue: Venue) {
        self.venues.write().insert(venue.id, venue);
    }
}

#[async_trait]
impl VenueCatalog for InMemoryVenueCatalog {
    async fn find_venue(&self, id: i32) -> AppResult<Option<Venue>> {
        Ok(self.venues.read().get(&id).cloned())
    }

    async fn list_venues(&self) -> AppResult<Vec<Venue>> {
        Ok(self.venues.read().values().cloned().collect())
    }

    async fn update_pricing(&self, id: i32, pricing: &VenuePricing) -> AppResult<Venue> {
        let mut venues = self.venues.write();
        let venue = venues
            .get_mut(&id)
            .ok_or_else(|| AppError::VenueNotFound(id.to_string()))?;
        venue.price_per_hour = pricing.price_per_hour;
        venue.price_per_day = pricing.price_per_day;
        venue.capacity = pricing.capacity;
        Ok(venue.clone())
    }
}
