//! Redis caching layer for Hallbook
//!
//! Provides the rolling available-dates cache on top of a generic Redis
//! `CacheService` with connection pooling. Booking writes invalidate a
//! venue's entry; readers recompute on a miss.
//!
//! # Example
//!
//! ```no_run
//! use hallbook_cache::RedisCache;
//! use hallbook_core::traits::CacheService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//!
//!     // Set a value with 60 second TTL
//!     cache.set("my_key", &"my_value", 60).await?;
//!
//!     // Get the value back
//!     let value: Option<String> = cache.get("my_key").await?;
//!     assert_eq!(value, Some("my_value".to_string()));
//!
//!     Ok(())
//! }
//! ```

pub mod keys;

use async_trait::async_trait;
use chrono::NaiveDate;
use hallbook_core::error::AppError;
use hallbook_core::traits::{AvailabilityCache, CacheService};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError, Script};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

/// Store `ARGV[2]` at `KEYS[2]` for `ARGV[3]` seconds if the generation at
/// `KEYS[1]` still equals `ARGV[1]`
const SET_IF_GENERATION: &str = r#"
local current = redis.call('GET', KEYS[1]) or '0'
if current == ARGV[1] then
    redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[3])
    return 1
end
return 0
"#;

/// Redis cache implementation with connection pooling
///
/// Wraps a Redis ConnectionManager to provide efficient, multiplexed access
/// to Redis. All operations are async and return Results with AppError.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    set_if_generation: Script,
}

impl RedisCache {
    /// Create a new Redis cache instance
    ///
    /// # Errors
    ///
    /// Returns `AppError::CacheConnection` if the connection fails
    pub async fn new(url: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis at {}", url);

        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::CacheConnection(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::CacheConnection(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established successfully");
        Ok(Self {
            manager,
            set_if_generation: Script::new(SET_IF_GENERATION),
        })
    }

    /// Ping the Redis server to check connectivity
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis ping failed: {}", e);
                AppError::Cache(format!("Ping failed: {}", e))
            })?;
        Ok(())
    }

    /// Convert RedisError to AppError
    fn map_redis_error(err: RedisError) -> AppError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                error!("Redis I/O error: {}", err);
                AppError::CacheConnection(format!("I/O error: {}", err))
            }
            redis::ErrorKind::TypeError => {
                warn!("Redis type error: {}", err);
                AppError::Cache(format!("Type mismatch: {}", err))
            }
            _ => {
                error!("Redis error: {}", err);
                AppError::Cache(err.to_string())
            }
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        debug!("GET {}", key);
        let mut conn = self.manager.clone();

        let result: Option<String> = conn.get(key).await.map_err(Self::map_redis_error)?;

        match result {
            Some(json) => {
                let value = serde_json::from_str::<T>(&json).map_err(|e| {
                    error!("Failed to deserialize value for key {}: {}", key, e);
                    AppError::Serialization(format!("Deserialization failed: {}", e))
                })?;
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        debug!("SET {} (TTL: {}s)", key, ttl_secs);
        let mut conn = self.manager.clone();

        let json = serde_json::to_string(value).map_err(|e| {
            error!("Failed to serialize value for key {}: {}", key, e);
            AppError::Serialization(format!("Serialization failed: {}", e))
        })?;

        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(())
    }

    /// `Ok(true)` if the key was deleted, `Ok(false)` if it didn't exist
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        debug!("DEL {}", key);
        let mut conn = self.manager.clone();

        let deleted: i32 = conn.del(key).await.map_err(Self::map_redis_error)?;

        Ok(deleted > 0)
    }
}

#[async_trait]
impl AvailabilityCache for RedisCache {
    async fn get_available_dates(&self, venue_id: i32) -> Result<Option<Vec<NaiveDate>>, AppError> {
        self.get(&keys::available_dates_key(venue_id)).await
    }

    async fn generation(&self, venue_id: i32) -> Result<u64, AppError> {
        let mut conn = self.manager.clone();
        let generation: Option<u64> = conn
            .get(keys::available_dates_generation_key(venue_id))
            .await
            .map_err(Self::map_redis_error)?;
        Ok(generation.unwrap_or(0))
    }

    async fn set_available_dates(
        &self,
        venue_id: i32,
        generation: u64,
        dates: &[NaiveDate],
        ttl_secs: u64,
    ) -> Result<bool, AppError> {
        let json = serde_json::to_string(dates).map_err(|e| {
            error!("Failed to serialize available dates for venue {}: {}", venue_id, e);
            AppError::Serialization(format!("Serialization failed: {}", e))
        })?;

        let mut conn = self.manager.clone();
        let stored: i32 = self
            .set_if_generation
            .key(keys::available_dates_generation_key(venue_id))
            .key(keys::available_dates_key(venue_id))
            .arg(generation)
            .arg(json)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;

        debug!(
            "SET available dates for venue {} at generation {}: {}",
            venue_id,
            generation,
            stored == 1
        );
        Ok(stored == 1)
    }

    async fn invalidate_venue(&self, venue_id: i32) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = redis::pipe()
            .atomic()
            .incr(keys::available_dates_generation_key(venue_id), 1)
            .ignore()
            .del(keys::available_dates_key(venue_id))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_cache() -> RedisCache {
        let cache = RedisCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        let mut conn = cache.manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .expect("Failed to flush DB");
        cache
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_ping() {
        let cache = setup_cache().await;
        assert!(cache.ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_available_dates_roundtrip_and_invalidate() {
        let cache = setup_cache().await;
        let dates = vec![
            NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2030, 1, 3).unwrap(),
        ];

        assert_eq!(cache.generation(3).await.unwrap(), 0);
        assert!(cache.set_available_dates(3, 0, &dates, 60).await.unwrap());
        assert_eq!(cache.get_available_dates(3).await.unwrap(), Some(dates));

        cache.invalidate_venue(3).await.unwrap();
        assert_eq!(cache.get_available_dates(3).await.unwrap(), None);
        assert_eq!(cache.generation(3).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_stale_generation_is_not_stored() {
        let cache = setup_cache().await;
        let dates = vec![NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()];

        let generation = cache.generation(5).await.unwrap();
        cache.invalidate_venue(5).await.unwrap();

        assert!(!cache
            .set_available_dates(5, generation, &dates, 60)
            .await
            .unwrap());
        assert_eq!(cache.get_available_dates(5).await.unwrap(), None);

        let current = cache.generation(5).await.unwrap();
        assert!(cache.set_available_dates(5, current, &dates, 60).await.unwrap());
        assert_eq!(cache.get_available_dates(5).await.unwrap(), Some(dates));
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_ttl_on_set() {
        let cache = setup_cache().await;
        let dates = vec![NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()];

        cache.set_available_dates(4, 0, &dates, 1).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        assert_eq!(cache.get_available_dates(4).await.unwrap(), None);
    }
}
