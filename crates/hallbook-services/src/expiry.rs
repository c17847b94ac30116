//! Stale pending booking sweeper
//!
//! Periodically cancels pending bookings whose payment window has closed so
//! abandoned checkouts stop holding their slots.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::booking_engine::BookingEngine;

/// Background task releasing expired pending bookings
pub struct ExpirySweeper {
    engine: Arc<BookingEngine>,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<BookingEngine>, period_secs: u64) -> Self {
        Self {
            engine,
            period: Duration::from_secs(period_secs.max(1)),
        }
    }

    /// Run a single sweep, returning the number of bookings released
    pub async fn sweep_once(&self) -> usize {
        match self.engine.expire_stale(Utc::now()).await {
            Ok(0) => {
                debug!("No expired pending bookings");
                0
            }
            Ok(released) => {
                info!("Released {} expired pending bookings", released);
                released
            }
            Err(e) => {
                error!("Expiry sweep failed: {}", e);
                0
            }
        }
    }

    /// Spawn the sweep loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        info!("Starting expiry sweeper every {:?}", self.period);

        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveTime};
    use hallbook_core::{
        config::BookingConfig,
        models::{Booking, BookingStatus, NewBooking},
        traits::BookingRepository,
    };
    use hallbook_db::{InMemoryBookingRepository, InMemoryVenueCatalog};
    use rust_decimal_macros::dec;

    fn stale_booking() -> Booking {
        let request = NewBooking {
            venue_id: 1,
            booking_date: Utc::now().date_naive() + ChronoDuration::days(5),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            idempotency_key: None,
        };
        let mut booking = Booking::new_pending(3, &request, dec!(30000), 900);
        booking.expires_at = Utc::now() - ChronoDuration::seconds(1);
        booking
    }

    async fn setup() -> (ExpirySweeper, Arc<InMemoryBookingRepository>, Booking) {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let booking = repo.insert_if_free(&stale_booking()).await.unwrap();
        let engine = Arc::new(BookingEngine::new(
            repo.clone(),
            Arc::new(InMemoryVenueCatalog::new()),
            None,
            BookingConfig::default(),
        ));
        (ExpirySweeper::new(engine, 1), repo, booking)
    }

    #[tokio::test]
    async fn test_sweep_once_releases_stale_booking() {
        let (sweeper, repo, booking) = setup().await;

        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(sweeper.sweep_once().await, 0);

        let stored = repo.find_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_spawned_loop_sweeps() {
        let (sweeper, repo, booking) = setup().await;

        let handle = sweeper.spawn();
        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let stored = repo.find_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }
}
