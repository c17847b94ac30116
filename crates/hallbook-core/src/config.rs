//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    pub payment: PaymentConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Apply pending migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_run_migrations() -> bool {
    true
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

/// Authentication configuration
///
/// Tokens are issued by the identity provider; this service only validates them.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret shared with the identity provider
    pub jwt_secret: String,

    /// JWT token expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
}

fn default_jwt_expiration() -> i64 {
    1800
}

/// Booking engine policy
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Width of listed availability slots in hours
    #[serde(default = "default_slot_width")]
    pub slot_width_hours: u32,

    /// Number of days (today inclusive) scanned for available dates
    #[serde(default = "default_horizon_days")]
    pub availability_horizon_days: u32,

    /// Lifetime of an unpaid pending booking in seconds
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: i64,

    /// Failed payment verifications tolerated before auto-cancel
    #[serde(default = "default_max_payment_attempts")]
    pub max_payment_attempts: i32,

    /// Lock and statement timeout for store writes in seconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    /// Interval of the stale pending booking sweeper in seconds
    #[serde(default = "default_sweep_interval")]
    pub expiry_sweep_interval_secs: u64,

    /// TTL for the cached available-dates list in seconds
    #[serde(default = "default_dates_cache_ttl")]
    pub available_dates_cache_ttl_secs: u64,
}

fn default_slot_width() -> u32 {
    3
}

fn default_horizon_days() -> u32 {
    30
}

fn default_pending_ttl() -> i64 {
    900 // 15 minutes
}

fn default_max_payment_attempts() -> i32 {
    3
}

fn default_store_timeout() -> u64 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_dates_cache_ttl() -> u64 {
    60
}

/// Payment gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Shared secret for gateway signatures
    pub gateway_secret: String,
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 20)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("auth.jwt_expiration_secs", 1800)?
            .set_default("booking.slot_width_hours", 3)?
            .set_default("booking.availability_horizon_days", 30)?
            .set_default("booking.pending_ttl_secs", 900)?
            .set_default("booking.max_payment_attempts", 3)?
            .set_default("booking.store_timeout_secs", 5)?
            .set_default("booking.expiry_sweep_interval_secs", 60)?
            .set_default("booking.available_dates_cache_ttl_secs", 60)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with HALLBOOK_ prefix
            .add_source(
                Environment::with_prefix("HALLBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Longest payment window a pending booking may hold its slot for
pub const MAX_PENDING_TTL_SECS: i64 = 86_400;

impl BookingConfig {
    /// Check the policy for values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_width_hours == 0 {
            return Err(ConfigError::Message(
                "booking.slot_width_hours must be at least 1".to_string(),
            ));
        }
        if self.availability_horizon_days == 0 {
            return Err(ConfigError::Message(
                "booking.availability_horizon_days must be at least 1".to_string(),
            ));
        }
        if self.max_payment_attempts < 1 {
            return Err(ConfigError::Message(
                "booking.max_payment_attempts must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_PENDING_TTL_SECS).contains(&self.pending_ttl_secs) {
            return Err(ConfigError::Message(format!(
                "booking.pending_ttl_secs must be between 1 and {}",
                MAX_PENDING_TTL_SECS
            )));
        }
        // lock_timeout = 0 disables the Postgres timeout entirely
        if self.store_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "booking.store_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.expiry_sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "booking.expiry_sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            slot_width_hours: 3,
            availability_horizon_days: 30,
            pending_ttl_secs: 900,
            max_payment_attempts: 3,
            store_timeout_secs: 5,
            expiry_sweep_interval_secs: 60,
            available_dates_cache_ttl_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_booking_config() {
        let config = BookingConfig::default();
        assert_eq!(config.slot_width_hours, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_booking_config() {
        let config = BookingConfig {
            slot_width_hours: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BookingConfig {
            max_payment_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        for ttl in [0, -60, MAX_PENDING_TTL_SECS + 1, i64::MAX] {
            let config = BookingConfig {
                pending_ttl_secs: ttl,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "ttl {} accepted", ttl);
        }

        let config = BookingConfig {
            store_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BookingConfig {
            expiry_sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pending_ttl_bounds_are_inclusive() {
        for ttl in [1, MAX_PENDING_TTL_SECS] {
            let config = BookingConfig {
                pending_ttl_secs: ttl,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
    }
}
