//! Repository implementations
//!
//! This module contains the PostgreSQL implementations of the storage traits
//! defined in hallbook-core, using sqlx.

pub mod analytics_repo;
pub mod booking_repo;
pub mod venue_repo;

pub use analytics_repo::PgAnalyticsRepository;
pub use booking_repo::PgBookingRepository;
pub use venue_repo::PgVenueRepository;
