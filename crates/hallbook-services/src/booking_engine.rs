//! Booking engine
//!
//! Orchestrates availability queries, conflict-checked creation and
//! cancellation over a `BookingRepository`. The store owns the atomic
//! "insert if no overlap" critical section; the engine validates requests,
//! snapshots the price and maps store outcomes onto caller-facing errors.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hallbook_core::{
    config::BookingConfig,
    models::{
        to_minor_units, Booking, BookingStatus, BookingTransition, NewBooking, Principal,
        TimeSlot, Venue, VenuePricing,
    },
    traits::{AvailabilityCache, BookingRepository, VenueCatalog},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::constants::{MAX_CALENDAR_RANGE_DAYS, MAX_IDEMPOTENCY_KEY_LEN};
use crate::slot_calculator::SlotCalculator;

/// Drop a venue's cached available dates; failures are logged, not raised
pub(crate) async fn invalidate_available_dates(
    cache: Option<&Arc<dyn AvailabilityCache>>,
    venue_id: i32,
) {
    if let Some(cache) = cache {
        if let Err(e) = cache.invalidate_venue(venue_id).await {
            warn!("Failed to invalidate available dates for venue {}: {}", venue_id, e);
        }
    }
}

/// Reservation engine
pub struct BookingEngine {
    bookings: Arc<dyn BookingRepository>,
    venues: Arc<dyn VenueCatalog>,
    cache: Option<Arc<dyn AvailabilityCache>>,
    policy: BookingConfig,
    slots: SlotCalculator,
}

impl BookingEngine {
    /// Create a new engine
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        venues: Arc<dyn VenueCatalog>,
        cache: Option<Arc<dyn AvailabilityCache>>,
        policy: BookingConfig,
    ) -> Self {
        let slots = SlotCalculator::new(policy.slot_width_hours);
        Self {
            bookings,
            venues,
            cache,
            policy,
            slots,
        }
    }

    pub fn policy(&self) -> &BookingConfig {
        &self.policy
    }

    async fn venue(&self, venue_id: i32) -> AppResult<Venue> {
        self.venues
            .find_venue(venue_id)
            .await?
            .ok_or_else(|| AppError::VenueNotFound(venue_id.to_string()))
    }

    async fn booking(&self, booking_id: Uuid) -> AppResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))
    }

    fn require_operator(principal: &Principal, action: &str) -> AppResult<()> {
        if principal.is_operator() {
            Ok(())
        } else {
            warn!(
                "User {} attempted operator action '{}'",
                principal.user_id, action
            );
            Err(AppError::Forbidden(format!("{} requires operator role", action)))
        }
    }

    /// Slots for a venue on `date`, flagged against bookings holding them now
    ///
    /// On today's date, slots that have already started are unavailable.
    #[instrument(skip(self))]
    pub async fn available_slots(&self, venue_id: i32, date: NaiveDate) -> AppResult<Vec<TimeSlot>> {
        let now = Utc::now();
        if date < now.date_naive() {
            return Err(AppError::Validation(format!("date {} is in the past", date)));
        }

        let venue = self.venue(venue_id).await?;
        let holding = self
            .bookings
            .find_holding_for_date(venue_id, date, now)
            .await?;

        let mut slots = self.slots.slots(&venue, &holding);
        if date == now.date_naive() {
            let current_time = now.time();
            for slot in slots.iter_mut().filter(|s| s.start_time <= current_time) {
                slot.available = false;
            }
        }
        Ok(slots)
    }

    /// Dates within the availability horizon with at least one free slot
    ///
    /// Served from the cache when present; the cache is invalidated on every
    /// booking write for the venue and a list computed across an
    /// invalidation is never stored.
    #[instrument(skip(self))]
    pub async fn available_dates(&self, venue_id: i32) -> AppResult<Vec<NaiveDate>> {
        let now = Utc::now();
        let today = now.date_naive();

        if let Some(cache) = &self.cache {
            match cache.get_available_dates(venue_id).await {
                Ok(Some(dates)) => {
                    debug!("Available dates cache hit for venue {}", venue_id);
                    return Ok(dates.into_iter().filter(|d| *d >= today).collect());
                }
                Ok(None) => {}
                Err(e) => warn!("Available dates cache read failed for venue {}: {}", venue_id, e),
            }
        }

        let venue = self.venue(venue_id).await?;

        // Taken before the scan so a write landing during it voids our result
        let generation = match &self.cache {
            Some(cache) => match cache.generation(venue_id).await {
                Ok(generation) => Some(generation),
                Err(e) => {
                    warn!("Available dates generation read failed for venue {}: {}", venue_id, e);
                    None
                }
            },
            None => None,
        };

        let last = today + Duration::days(i64::from(self.policy.availability_horizon_days) - 1);
        let holding = self
            .bookings
            .find_holding_in_range(venue_id, today, last, now)
            .await?;

        let mut by_date: HashMap<NaiveDate, Vec<Booking>> = HashMap::new();
        for booking in holding {
            by_date.entry(booking.booking_date).or_default().push(booking);
        }

        let current_time = now.time();
        let dates: Vec<NaiveDate> = today
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|date| {
                let holding = by_date.get(date).map(Vec::as_slice).unwrap_or(&[]);
                self.slots
                    .slots(&venue, holding)
                    .iter()
                    .any(|s| s.available && (*date > today || s.start_time > current_time))
            })
            .collect();

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            match cache
                .set_available_dates(
                    venue_id,
                    generation,
                    &dates,
                    self.policy.available_dates_cache_ttl_secs,
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!(
                    "Venue {} invalidated during scan, not caching available dates",
                    venue_id
                ),
                Err(e) => warn!("Failed to cache available dates for venue {}: {}", venue_id, e),
            }
        }

        Ok(dates)
    }

    fn validate_idempotency_key(key: Option<&str>) -> AppResult<()> {
        match key {
            Some(k) if k.trim().is_empty() => Err(AppError::Validation(
                "idempotency key must not be blank".to_string(),
            )),
            Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(AppError::Validation(format!(
                "idempotency key longer than {} characters",
                MAX_IDEMPOTENCY_KEY_LEN
            ))),
            _ => Ok(()),
        }
    }

    /// Replay of an earlier create with the same key
    fn replay(existing: Booking, request: &NewBooking) -> AppResult<Booking> {
        if existing.matches_request(request) {
            debug!("Idempotent replay of booking {}", existing.id);
            Ok(existing)
        } else {
            Err(AppError::Validation(
                "idempotency key already used for a different booking request".to_string(),
            ))
        }
    }

    /// Create a pending booking for the caller
    ///
    /// # Errors
    ///
    /// - `Validation` for past dates, misaligned or out-of-hours ranges and
    ///   reused idempotency keys with different parameters
    /// - `VenueNotFound` for unknown venues
    /// - `SlotUnavailable` when another booking holds an overlapping range
    /// - `Unavailable` when the store cannot serialize the write in time
    #[instrument(skip(self, request), fields(venue_id = request.venue_id, date = %request.booking_date))]
    pub async fn create_booking(
        &self,
        principal: &Principal,
        request: NewBooking,
    ) -> AppResult<Booking> {
        let key = request.idempotency_key.as_deref();
        Self::validate_idempotency_key(key)?;

        if let Some(key) = key {
            if let Some(existing) = self
                .bookings
                .find_by_idempotency_key(principal.user_id, key)
                .await?
            {
                return Self::replay(existing, &request);
            }
        }

        let now = Utc::now();
        let today = now.date_naive();
        if request.booking_date < today {
            return Err(AppError::Validation(format!(
                "date {} is in the past",
                request.booking_date
            )));
        }

        let venue = self.venue(request.venue_id).await?;
        SlotCalculator::validate_range(&venue, request.start_time, request.end_time)?;

        if request.booking_date == today && request.start_time <= now.time() {
            return Err(AppError::Validation(format!(
                "start time {} has already passed",
                request.start_time.format("%H:%M")
            )));
        }

        let hours = (request.end_time - request.start_time).num_hours();
        let total = venue
            .price_for(hours)
            .filter(|total| to_minor_units(*total).is_some())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "total for {} hours exceeds the payable amount",
                    hours
                ))
            })?;
        let booking = Booking::new_pending(
            principal.user_id,
            &request,
            total,
            self.policy.pending_ttl_secs,
        );

        match self.bookings.insert_if_free(&booking).await {
            Ok(created) => {
                info!(
                    "Created booking {} for customer {} at venue {} on {} {}-{} total {}",
                    created.id,
                    created.customer_id,
                    created.venue_id,
                    created.booking_date,
                    created.start_time.format("%H:%M"),
                    created.end_time.format("%H:%M"),
                    created.total_amount
                );
                invalidate_available_dates(self.cache.as_ref(), created.venue_id).await;
                Ok(created)
            }
            Err(AppError::Conflict(msg)) => {
                debug!("Slot conflict: {}", msg);
                Err(AppError::SlotUnavailable(format!(
                    "{} {}-{} is no longer available, please pick another slot",
                    request.booking_date,
                    request.start_time.format("%H:%M"),
                    request.end_time.format("%H:%M")
                )))
            }
            Err(AppError::AlreadyExists(_)) => {
                // Lost a race against a retry carrying the same key
                let key = key.unwrap_or_default();
                let existing = self
                    .bookings
                    .find_by_idempotency_key(principal.user_id, key)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!("idempotency key {} vanished", key))
                    })?;
                Self::replay(existing, &request)
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel a pending or confirmed booking that has not ended yet
    #[instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        principal: &Principal,
        booking_id: Uuid,
    ) -> AppResult<Booking> {
        let booking = self.booking(booking_id).await?;

        if !principal.can_access(booking.customer_id) {
            warn!(
                "User {} attempted to cancel booking {} owned by {}",
                principal.user_id, booking_id, booking.customer_id
            );
            return Err(AppError::Forbidden(format!(
                "booking {} belongs to another customer",
                booking_id
            )));
        }

        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::InvalidState(format!(
                "booking {} is already cancelled",
                booking_id
            )));
        }
        if booking.ends_at() <= Utc::now() {
            return Err(AppError::InvalidState(format!(
                "booking {} has already ended",
                booking_id
            )));
        }

        let transition = BookingTransition::cancel(booking.payment_status);
        let cancelled = self
            .bookings
            .apply_transition(booking_id, booking.status, &transition)
            .await?;

        if booking.status == BookingStatus::Confirmed {
            info!(
                booking_id = %booking_id,
                amount = %booking.total_amount,
                refund_required = true,
                "Cancelled paid booking"
            );
        } else {
            info!("Cancelled booking {} by user {}", booking_id, principal.user_id);
        }

        invalidate_available_dates(self.cache.as_ref(), cancelled.venue_id).await;
        Ok(cancelled)
    }

    /// A single booking, visible to its owner or an operator
    pub async fn get_booking(&self, principal: &Principal, booking_id: Uuid) -> AppResult<Booking> {
        let booking = self.booking(booking_id).await?;
        if !principal.can_access(booking.customer_id) {
            return Err(AppError::Forbidden(format!(
                "booking {} belongs to another customer",
                booking_id
            )));
        }
        Ok(booking)
    }

    /// A customer's bookings, newest first
    pub async fn list_for_customer(
        &self,
        principal: &Principal,
        customer_id: i32,
    ) -> AppResult<Vec<Booking>> {
        if !principal.can_access(customer_id) {
            return Err(AppError::Forbidden(format!(
                "cannot list bookings of customer {}",
                customer_id
            )));
        }
        self.bookings.list_by_customer(customer_id).await
    }

    /// A venue's bookings, newest first (operator only)
    pub async fn list_for_venue(
        &self,
        principal: &Principal,
        venue_id: i32,
    ) -> AppResult<Vec<Booking>> {
        Self::require_operator(principal, "listing venue bookings")?;
        self.venue(venue_id).await?;
        self.bookings.list_by_venue(venue_id).await
    }

    /// Non-cancelled bookings of every venue in `[from, to]` (operator only)
    pub async fn calendar(
        &self,
        principal: &Principal,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<Booking>> {
        Self::require_operator(principal, "viewing the booking calendar")?;

        if from > to {
            return Err(AppError::Validation(format!(
                "calendar start {} is after end {}",
                from, to
            )));
        }
        if (to - from).num_days() > MAX_CALENDAR_RANGE_DAYS {
            return Err(AppError::Validation(format!(
                "calendar range exceeds {} days",
                MAX_CALENDAR_RANGE_DAYS
            )));
        }

        self.bookings.list_between(from, to).await
    }

    /// Update a venue's rates and capacity (operator only)
    ///
    /// Totals of existing bookings are never recomputed.
    #[instrument(skip(self, pricing))]
    pub async fn update_pricing(
        &self,
        principal: &Principal,
        venue_id: i32,
        pricing: VenuePricing,
    ) -> AppResult<Venue> {
        Self::require_operator(principal, "updating venue pricing")?;

        if pricing.price_per_hour < Decimal::ZERO || pricing.price_per_day < Decimal::ZERO {
            return Err(AppError::Validation("prices must not be negative".to_string()));
        }
        if pricing.capacity <= 0 {
            return Err(AppError::Validation("capacity must be positive".to_string()));
        }
        let full_day = pricing
            .price_per_hour
            .checked_mul(Decimal::from(24))
            .and_then(to_minor_units);
        if full_day.is_none() || to_minor_units(pricing.price_per_day).is_none() {
            return Err(AppError::Validation(
                "prices exceed the payable amount".to_string(),
            ));
        }

        let venue = self.venues.update_pricing(venue_id, &pricing).await?;
        info!(
            "Venue {} pricing updated by operator {}: {}/h {}/day capacity {}",
            venue_id,
            principal.user_id,
            venue.price_per_hour,
            venue.price_per_day,
            venue.capacity
        );
        Ok(venue)
    }

    /// Cancel pending bookings whose payment window closed before `now`
    ///
    /// Returns the number of bookings released.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let expired = self.bookings.expire_stale_pending(now).await?;

        let venues: BTreeSet<i32> = expired.iter().map(|b| b.venue_id).collect();
        for venue_id in venues {
            invalidate_available_dates(self.cache.as_ref(), venue_id).await;
        }

        Ok(expired.len())
    }
}
