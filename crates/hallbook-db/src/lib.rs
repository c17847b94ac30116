//! Hallbook Database Layer
//!
//! This crate provides PostgreSQL database access and repository implementations
//! for the Hallbook booking engine. It includes:
//!
//! - Connection pool management and migrations with sqlx
//! - The advisory-locked conflict-checked booking insert
//! - Venue catalog and analytics rollup queries
//! - An in-memory store with the same guarantees, keyed by venue and date

pub mod error;
pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::{InMemoryBookingRepository, InMemoryVenueCatalog};
pub use pool::{create_pool, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use hallbook_core::{AppError, AppResult};
pub use sqlx::PgPool;
