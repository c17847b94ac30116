//! Booking model
//!
//! A customer's claim on a venue for a date and time range, with a
//! payment-gated lifecycle:
//!
//! ```text
//!   pending/pending ──payment ok──► confirmed/completed
//!          │
//!          └──fail / expire / cancel──► cancelled/failed
//! ```
//!
//! `confirmed` and `cancelled` are terminal for status; a confirmed booking
//! may still be cancelled by its owner or an operator before it ends.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::MAX_PENDING_TTL_SECS;

use super::time_format;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting payment
    #[default]
    Pending,
    /// Paid and verified
    Confirmed,
    /// Cancelled by owner, operator, payment failure or expiry
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl BookingStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Verified gateway proof attached to a booking. Written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Gateway transaction id
    pub payment_id: String,

    /// Signature supplied by the gateway
    #[serde(skip_serializing)]
    pub signature: String,

    /// When the signature was verified
    pub verified_at: DateTime<Utc>,
}

/// Half-open interval intersection: `[a_start, a_end)` and `[b_start, b_end)`
#[inline]
pub fn intervals_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Reservation request as validated by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub venue_id: i32,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub idempotency_key: Option<String>,
}

/// Booking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier (UUID)
    pub id: Uuid,

    /// Booked venue
    pub venue_id: i32,

    /// Owning customer
    pub customer_id: i32,

    /// Venue-local date
    pub booking_date: NaiveDate,

    /// Inclusive start
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,

    /// Exclusive end
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,

    /// Price snapshotted at creation
    pub total_amount: Decimal,

    pub status: BookingStatus,

    pub payment_status: PaymentStatus,

    /// Verified payment proof, if any
    pub payment: Option<PaymentRecord>,

    /// Failed verification attempts
    pub payment_attempts: i32,

    /// Client supplied key making creation idempotent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,

    /// When an unpaid pending booking stops holding its slot
    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Create a new pending booking
    ///
    /// The payment window is clamped to `1..=MAX_PENDING_TTL_SECS` seconds.
    pub fn new_pending(
        customer_id: i32,
        request: &NewBooking,
        total_amount: Decimal,
        pending_ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        let window = Duration::seconds(pending_ttl_secs.clamp(1, MAX_PENDING_TTL_SECS));
        Self {
            id: Uuid::new_v4(),
            venue_id: request.venue_id,
            customer_id,
            booking_date: request.booking_date,
            start_time: request.start_time,
            end_time: request.end_time,
            total_amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment: None,
            payment_attempts: 0,
            idempotency_key: request.idempotency_key.clone(),
            expires_at: now + window,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        }
    }

    /// Check if this booking's range intersects `[start, end)`
    #[inline]
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        intervals_overlap(self.start_time, self.end_time, start, end)
    }

    /// Check if this is a pending booking past its payment window
    pub fn is_expired_pending(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at <= now
    }

    /// Check if the booking currently blocks its time range
    pub fn holds_slot(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            BookingStatus::Confirmed => true,
            BookingStatus::Pending => self.expires_at > now,
            BookingStatus::Cancelled => false,
        }
    }

    /// Length of the booking in whole hours
    pub fn duration_hours(&self) -> i64 {
        (self.end_time - self.start_time).num_hours()
    }

    /// Instant at which the booking ends, treating the venue-local date as UTC
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.booking_date.and_time(self.end_time).and_utc()
    }

    /// Check if the booking was created for exactly this request
    pub fn matches_request(&self, request: &NewBooking) -> bool {
        self.venue_id == request.venue_id
            && self.booking_date == request.booking_date
            && self.start_time == request.start_time
            && self.end_time == request.end_time
    }

    /// Amount in minor currency units as signed by the payment gateway
    pub fn amount_minor_units(&self) -> Option<i64> {
        to_minor_units(self.total_amount)
    }
}

/// Convert an amount to minor currency units, `None` if it does not fit an `i64`
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;

    amount.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
}

/// State change applied atomically by the store
///
/// The payment record is only written if none is stored yet.
#[derive(Debug, Clone)]
pub struct BookingTransition {
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment: Option<PaymentRecord>,
    /// Count a failed verification and cancel once the count reaches the limit
    pub failed_attempt_limit: Option<i32>,
}

impl BookingTransition {
    /// Verified payment: confirm
    pub fn confirm(payment: PaymentRecord) -> Self {
        Self {
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Completed,
            payment: Some(payment),
            failed_attempt_limit: None,
        }
    }

    /// Rejected payment proof; the booking stays pending until `max_attempts`
    pub fn payment_failed(max_attempts: i32) -> Self {
        Self {
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Failed,
            payment: None,
            failed_attempt_limit: Some(max_attempts),
        }
    }

    /// Owner, operator or expiry cancellation
    ///
    /// Paid bookings keep `completed` so the refund remains traceable.
    pub fn cancel(current_payment: PaymentStatus) -> Self {
        let payment_status = match current_payment {
            PaymentStatus::Completed => PaymentStatus::Completed,
            _ => PaymentStatus::Failed,
        };
        Self {
            status: BookingStatus::Cancelled,
            payment_status,
            payment: None,
            failed_attempt_limit: None,
        }
    }

    /// Apply to an in-memory copy, mirroring the store's update
    pub fn apply_to(&self, booking: &mut Booking, now: DateTime<Utc>) {
        booking.status = self.status;
        booking.payment_status = self.payment_status;
        if booking.payment.is_none() {
            booking.payment = self.payment.clone();
        }
        if let Some(limit) = self.failed_attempt_limit {
            booking.payment_attempts += 1;
            if booking.payment_attempts >= limit {
                booking.status = BookingStatus::Cancelled;
            }
        }
        if booking.status == BookingStatus::Cancelled && booking.cancelled_at.is_none() {
            booking.cancelled_at = Some(now);
        }
        booking.updated_at = now;
    }
}
