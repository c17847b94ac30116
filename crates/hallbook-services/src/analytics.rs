//! Analytics aggregator
//!
//! Operator-facing rollups over the booking store. Queries are read-only;
//! venue names come from the catalog and venues without activity are
//! reported with zero values.

use hallbook_core::{
    models::{MonthlyRevenue, PaymentFunnel, Principal, Venue, VenueBookingCount, VenueRevenue},
    traits::{AnalyticsRepository, VenueCatalog},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Analytics service
pub struct AnalyticsService {
    analytics: Arc<dyn AnalyticsRepository>,
    venues: Arc<dyn VenueCatalog>,
}

impl AnalyticsService {
    pub fn new(analytics: Arc<dyn AnalyticsRepository>, venues: Arc<dyn VenueCatalog>) -> Self {
        Self { analytics, venues }
    }

    fn require_operator(principal: &Principal) -> AppResult<()> {
        if principal.is_operator() {
            Ok(())
        } else {
            warn!("User {} attempted to read analytics", principal.user_id);
            Err(AppError::Forbidden("analytics require operator role".to_string()))
        }
    }

    async fn venue_names(&self) -> AppResult<BTreeMap<i32, String>> {
        Ok(self
            .venues
            .list_venues()
            .await?
            .into_iter()
            .map(|Venue { id, name, .. }| (id, name))
            .collect())
    }

    /// Sum of confirmed booking totals
    pub async fn total_revenue(&self, principal: &Principal) -> AppResult<Decimal> {
        Self::require_operator(principal)?;
        self.analytics.total_revenue().await
    }

    /// Confirmed revenue for each month of `year`, always twelve rows
    #[instrument(skip(self, principal))]
    pub async fn monthly_revenue(
        &self,
        principal: &Principal,
        year: i32,
    ) -> AppResult<Vec<MonthlyRevenue>> {
        Self::require_operator(principal)?;

        let mut rows: BTreeMap<u32, MonthlyRevenue> = (1..=12)
            .map(|month| {
                (
                    month,
                    MonthlyRevenue {
                        month,
                        revenue: Decimal::ZERO,
                        bookings: 0,
                    },
                )
            })
            .collect();

        for row in self.analytics.monthly_revenue(year).await? {
            if let Some(slot) = rows.get_mut(&row.month) {
                *slot = row;
            }
        }

        Ok(rows.into_values().collect())
    }

    /// Confirmed revenue per venue, highest first
    pub async fn revenue_by_venue(&self, principal: &Principal) -> AppResult<Vec<VenueRevenue>> {
        Self::require_operator(principal)?;

        let names = self.venue_names().await?;
        let mut rows: BTreeMap<i32, VenueRevenue> = names
            .iter()
            .map(|(id, name)| {
                (
                    *id,
                    VenueRevenue {
                        venue_id: *id,
                        venue_name: name.clone(),
                        revenue: Decimal::ZERO,
                        bookings: 0,
                    },
                )
            })
            .collect();

        for mut row in self.analytics.revenue_by_venue().await? {
            if let Some(name) = names.get(&row.venue_id) {
                row.venue_name = name.clone();
            }
            rows.insert(row.venue_id, row);
        }

        let mut rows: Vec<VenueRevenue> = rows.into_values().collect();
        rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.venue_id.cmp(&b.venue_id)));
        Ok(rows)
    }

    /// Non-cancelled booking count per venue, busiest first
    pub async fn bookings_by_venue(
        &self,
        principal: &Principal,
    ) -> AppResult<Vec<VenueBookingCount>> {
        Self::require_operator(principal)?;

        let names = self.venue_names().await?;
        let mut rows: BTreeMap<i32, VenueBookingCount> = names
            .iter()
            .map(|(id, name)| {
                (
                    *id,
                    VenueBookingCount {
                        venue_id: *id,
                        venue_name: name.clone(),
                        bookings: 0,
                    },
                )
            })
            .collect();

        for mut row in self.analytics.bookings_by_venue().await? {
            if let Some(name) = names.get(&row.venue_id) {
                row.venue_name = name.clone();
            }
            rows.insert(row.venue_id, row);
        }

        let mut rows: Vec<VenueBookingCount> = rows.into_values().collect();
        rows.sort_by(|a, b| b.bookings.cmp(&a.bookings).then(a.venue_id.cmp(&b.venue_id)));
        Ok(rows)
    }

    /// Booking count per payment status
    pub async fn payment_funnel(&self, principal: &Principal) -> AppResult<PaymentFunnel> {
        Self::require_operator(principal)?;
        self.analytics.payment_funnel().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};
    use hallbook_core::{
        models::{Booking, BookingStatus, BookingTransition, NewBooking, PaymentRecord},
        traits::BookingRepository,
    };
    use hallbook_db::{InMemoryBookingRepository, InMemoryVenueCatalog};
    use rust_decimal_macros::dec;

    fn venue(id: i32, name: &str) -> Venue {
        Venue {
            id,
            name: name.to_string(),
            capacity: 100,
            price_per_hour: dec!(10000),
            price_per_day: dec!(70000),
            location: "Center".to_string(),
            opens_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            closes_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        }
    }

    async fn insert(
        repo: &InMemoryBookingRepository,
        venue_id: i32,
        date: NaiveDate,
        start: u32,
        total: Decimal,
    ) -> Booking {
        let request = NewBooking {
            venue_id,
            booking_date: date,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(start + 1, 0, 0).unwrap(),
            idempotency_key: None,
        };
        repo.insert_if_free(&Booking::new_pending(1, &request, total, 900))
            .await
            .unwrap()
    }

    async fn confirm(repo: &InMemoryBookingRepository, booking: &Booking) {
        let record = PaymentRecord {
            payment_id: format!("pay_{}", booking.id),
            signature: "00".to_string(),
            verified_at: Utc::now(),
        };
        repo.apply_transition(
            booking.id,
            BookingStatus::Pending,
            &BookingTransition::confirm(record),
        )
        .await
        .unwrap();
    }

    async fn setup() -> AnalyticsService {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let date = NaiveDate::from_ymd_opt(2030, 3, 15).unwrap();

        let paid = insert(&repo, 1, date, 9, dec!(10000)).await;
        confirm(&repo, &paid).await;
        let paid_later = insert(&repo, 1, date + Duration::days(31), 9, dec!(20000)).await;
        confirm(&repo, &paid_later).await;

        // Pending and cancelled bookings never count as revenue
        insert(&repo, 1, date, 12, dec!(10000)).await;
        let cancelled = insert(&repo, 1, date, 14, dec!(10000)).await;
        repo.apply_transition(
            cancelled.id,
            BookingStatus::Pending,
            &BookingTransition::cancel(cancelled.payment_status),
        )
        .await
        .unwrap();

        // Booking at a venue missing from the catalog
        let orphan = insert(&repo, 9, date, 9, dec!(5000)).await;
        confirm(&repo, &orphan).await;

        let catalog = InMemoryVenueCatalog::with_venues([venue(1, "Grand Hall"), venue(2, "Garden")]);
        AnalyticsService::new(repo, Arc::new(catalog))
    }

    #[tokio::test]
    async fn test_total_revenue_counts_confirmed_only() {
        let service = setup().await;
        let total = service.total_revenue(&Principal::operator(1)).await.unwrap();
        assert_eq!(total, dec!(35000));
    }

    #[tokio::test]
    async fn test_monthly_revenue_is_zero_filled() {
        let service = setup().await;
        let months = service
            .monthly_revenue(&Principal::operator(1), 2030)
            .await
            .unwrap();

        assert_eq!(months.len(), 12);
        assert_eq!(months[2].month, 3);
        assert_eq!(months[2].revenue, dec!(15000));
        assert_eq!(months[2].bookings, 2);
        assert_eq!(months[3].revenue, dec!(20000));
        assert_eq!(months[0].revenue, Decimal::ZERO);

        let empty = service
            .monthly_revenue(&Principal::operator(1), 2029)
            .await
            .unwrap();
        assert!(empty.iter().all(|m| m.revenue == Decimal::ZERO && m.bookings == 0));
    }

    #[tokio::test]
    async fn test_revenue_by_venue_merges_catalog() {
        let service = setup().await;
        let rows = service
            .revenue_by_venue(&Principal::operator(1))
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].venue_id, 1);
        assert_eq!(rows[0].venue_name, "Grand Hall");
        assert_eq!(rows[0].revenue, dec!(30000));
        assert_eq!(rows[1].venue_id, 9);
        assert_eq!(rows[2].venue_name, "Garden");
        assert_eq!(rows[2].revenue, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_bookings_by_venue_excludes_cancelled() {
        let service = setup().await;
        let rows = service
            .bookings_by_venue(&Principal::operator(1))
            .await
            .unwrap();

        let hall = rows.iter().find(|r| r.venue_id == 1).unwrap();
        assert_eq!(hall.bookings, 3);
        let garden = rows.iter().find(|r| r.venue_id == 2).unwrap();
        assert_eq!(garden.bookings, 0);
    }

    #[tokio::test]
    async fn test_payment_funnel() {
        let service = setup().await;
        let funnel = service.payment_funnel(&Principal::operator(1)).await.unwrap();

        assert_eq!(funnel.total_payments, 5);
        assert_eq!(funnel.completed, 3);
        assert_eq!(funnel.pending, 1);
        assert_eq!(funnel.failed, 1);
    }

    #[tokio::test]
    async fn test_customers_are_forbidden() {
        let service = setup().await;
        let err = service
            .total_revenue(&Principal::customer(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
