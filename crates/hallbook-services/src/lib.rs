//! Business logic services for Hallbook
//!
//! This crate contains the services that orchestrate bookings over the
//! storage traits from hallbook-core.
//!
//! # Architecture
//!
//! Services depend on trait objects (`Arc<dyn BookingRepository>` and
//! friends) so the same engine runs over PostgreSQL or the in-memory store.
//! Every operation takes the caller's `Principal` explicitly.
//!
//! # Services
//!
//! - `SlotCalculator` - Fixed-width slot listing and range validation
//! - `BookingEngine` - Availability, conflict-checked creation, cancellation, listings
//! - `PaymentConfirmationHandler` - Applies gateway proofs to pending bookings
//! - `HmacSha256Verifier` - Gateway signature check
//! - `AnalyticsService` - Revenue, occupancy and payment funnel rollups
//! - `ExpirySweeper` - Periodic release of unpaid pending bookings

pub mod analytics;
pub mod booking_engine;
pub mod expiry;
pub mod payment;
pub mod slot_calculator;

pub use analytics::AnalyticsService;
pub use booking_engine::BookingEngine;
pub use expiry::ExpirySweeper;
pub use payment::{HmacSha256Verifier, PaymentConfirmationHandler};
pub use slot_calculator::SlotCalculator;

/// Business logic constants
pub mod constants {
    /// Longest calendar range an operator may request, in days
    pub const MAX_CALENDAR_RANGE_DAYS: i64 = 366;

    /// Longest accepted idempotency key
    pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 200;
}
