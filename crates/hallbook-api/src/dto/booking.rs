//! Booking DTOs
//!
//! Request and response types for reservation endpoints.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use hallbook_core::models::{time_format, Booking, BookingStatus, NewBooking, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reservation request
///
/// The idempotency key travels in the `Idempotency-Key` header.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1, message = "venue_id must be positive"))]
    pub venue_id: i32,

    pub booking_date: NaiveDate,

    /// Inclusive start, `HH:MM`
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,

    /// Exclusive end, `HH:MM`
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,
}

impl CreateBookingRequest {
    pub fn into_new_booking(self, idempotency_key: Option<String>) -> NewBooking {
        NewBooking {
            venue_id: self.venue_id,
            booking_date: self.booking_date,
            start_time: self.start_time,
            end_time: self.end_time,
            idempotency_key,
        }
    }
}

/// Operator calendar range, both ends inclusive
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Booking as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub venue_id: i32,
    pub customer_id: i32,
    pub booking_date: NaiveDate,
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "time_format")]
    pub end_time: NaiveTime,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub payment_attempts: i32,
    /// Payment deadline, only while pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        let expires_at = (b.status == BookingStatus::Pending).then_some(b.expires_at);
        Self {
            id: b.id,
            venue_id: b.venue_id,
            customer_id: b.customer_id,
            booking_date: b.booking_date,
            start_time: b.start_time,
            end_time: b.end_time,
            total_amount: b.total_amount,
            status: b.status,
            payment_status: b.payment_status,
            payment_id: b.payment.map(|p| p.payment_id),
            payment_attempts: b.payment_attempts,
            expires_at,
            created_at: b.created_at,
            cancelled_at: b.cancelled_at,
        }
    }
}
