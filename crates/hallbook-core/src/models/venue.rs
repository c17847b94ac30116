//! Venue model
//!
//! Venues are owned by the catalog; the engine reads operating hours and the
//! current rates, and operators may edit pricing and capacity.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::time_format;

/// Bookable venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    /// Unique identifier
    pub id: i32,

    /// Display name
    pub name: String,

    /// Maximum number of guests
    pub capacity: i32,

    /// Hourly rate, used for every booking total
    pub price_per_hour: Decimal,

    /// Daily rate, informational
    pub price_per_day: Decimal,

    pub location: String,

    /// Opening time
    #[serde(with = "time_format")]
    pub opens_at: NaiveTime,

    /// Closing time
    #[serde(with = "time_format")]
    pub closes_at: NaiveTime,
}

impl Venue {
    /// Check if `[start, end)` lies inside the operating hours
    pub fn is_within_hours(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.opens_at && end <= self.closes_at
    }

    /// Price for a booking of `hours` at the current hourly rate
    pub fn price_for(&self, hours: i64) -> Option<Decimal> {
        self.price_per_hour.checked_mul(Decimal::from(hours))
    }
}

/// Operator edit of a venue's rates
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VenuePricing {
    pub price_per_hour: Decimal,
    pub price_per_day: Decimal,
    pub capacity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn venue() -> Venue {
        Venue {
            id: 1,
            name: "Grand Hall".to_string(),
            capacity: 200,
            price_per_hour: dec!(10000),
            price_per_day: dec!(70000),
            location: "Downtown".to_string(),
            opens_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            closes_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_within_hours() {
        let v = venue();
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        assert!(v.is_within_hours(t(9), t(18)));
        assert!(v.is_within_hours(t(15), t(18)));
        assert!(!v.is_within_hours(t(8), t(10)));
        assert!(!v.is_within_hours(t(17), t(19)));
    }

    #[test]
    fn test_price_for() {
        assert_eq!(venue().price_for(3), Some(dec!(30000)));

        let mut v = venue();
        v.price_per_hour = Decimal::MAX;
        assert_eq!(v.price_for(2), None);
    }

    #[test]
    fn test_serializes_hours_as_hhmm() {
        let json = serde_json::to_value(venue()).unwrap();
        assert_eq!(json["opens_at"], "09:00");
        assert_eq!(json["closes_at"], "18:00");
    }
}
