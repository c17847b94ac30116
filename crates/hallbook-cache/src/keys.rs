//! Cache key constants and builders for Hallbook
//!
//! # Key Patterns
//!
//! - `available_dates:{venue_id}` - Dates with at least one free slot for a venue
//! - `available_dates_gen:{venue_id}` - Invalidation counter guarding writes of the above
//!
//! Slot listings are never cached; every availability query reads the store.
//!
//! # Example
//!
//! ```
//! use hallbook_cache::keys;
//!
//! let key = keys::available_dates_key(7);
//! assert_eq!(key, "available_dates:7");
//! ```

/// Prefix for a venue's available dates
///
/// Format: `available_dates:{venue_id}`
pub const AVAILABLE_DATES_PREFIX: &str = "available_dates";

/// Prefix for a venue's available-dates generation counter
pub const AVAILABLE_DATES_GEN_PREFIX: &str = "available_dates_gen";

/// Build a cache key for a venue's available dates
pub fn available_dates_key(venue_id: i32) -> String {
    format!("{}:{}", AVAILABLE_DATES_PREFIX, venue_id)
}

/// Build the generation counter key for a venue's available dates
pub fn available_dates_generation_key(venue_id: i32) -> String {
    format!("{}:{}", AVAILABLE_DATES_GEN_PREFIX, venue_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_dates_key() {
        assert_eq!(available_dates_key(1), "available_dates:1");
        assert_eq!(available_dates_key(42), "available_dates:42");
        assert_eq!(
            available_dates_generation_key(42),
            "available_dates_gen:42"
        );
    }
}
