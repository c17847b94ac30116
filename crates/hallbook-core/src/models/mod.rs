//! Domain models for Hallbook
//!
//! This module contains all the core domain models used by the booking engine.

pub mod analytics;
pub mod booking;
pub mod principal;
pub mod slot;
pub mod time_format;
pub mod venue;

pub use analytics::{MonthlyRevenue, PaymentFunnel, VenueBookingCount, VenueRevenue};
pub use booking::{
    intervals_overlap, to_minor_units, Booking, BookingStatus, BookingTransition, NewBooking,
    PaymentRecord, PaymentStatus,
};
pub use principal::{Principal, Role};
pub use slot::TimeSlot;
pub use venue::{Venue, VenuePricing};
