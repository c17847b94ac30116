//! Read-side rollups over bookings

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Revenue of confirmed bookings for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// 1..=12
    pub month: u32,
    pub revenue: Decimal,
    pub bookings: i64,
}

/// Revenue of confirmed bookings for one venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueRevenue {
    pub venue_id: i32,
    pub venue_name: String,
    pub revenue: Decimal,
    pub bookings: i64,
}

/// Non-cancelled bookings for one venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueBookingCount {
    pub venue_id: i32,
    pub venue_name: String,
    pub bookings: i64,
}

/// Bookings grouped by payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentFunnel {
    pub total_payments: i64,
    pub completed: i64,
    pub pending: i64,
    pub failed: i64,
}
