//! HTTP request handlers

pub mod analytics;
pub mod booking;
pub mod health;
pub mod payment;
pub mod venue;

pub use analytics::configure as configure_analytics;
pub use booking::configure as configure_bookings;
pub use health::configure as configure_health;
pub use payment::configure as configure_payments;
pub use venue::configure as configure_venues;
