//! Venue DTOs

use chrono::NaiveDate;
use hallbook_core::models::{TimeSlot, VenuePricing};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Availability query
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

/// Slots of one venue on one date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub venue_id: i32,
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
}

/// Dates with at least one free slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDatesResponse {
    pub venue_id: i32,
    pub dates: Vec<NaiveDate>,
}

/// Operator pricing edit
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePricingRequest {
    pub price_per_hour: Decimal,

    pub price_per_day: Decimal,

    #[validate(range(min = 1, message = "capacity must be positive"))]
    pub capacity: i32,
}

impl From<UpdatePricingRequest> for VenuePricing {
    fn from(req: UpdatePricingRequest) -> Self {
        Self {
            price_per_hour: req.price_per_hour,
            price_per_day: req.price_per_day,
            capacity: req.capacity,
        }
    }
}
