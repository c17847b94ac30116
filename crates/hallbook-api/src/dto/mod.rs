//! Data Transfer Objects (DTOs) for API requests and responses

pub mod analytics;
pub mod booking;
pub mod common;
pub mod payment;
pub mod venue;

pub use analytics::*;
pub use booking::*;
pub use common::*;
pub use payment::*;
pub use venue::*;
