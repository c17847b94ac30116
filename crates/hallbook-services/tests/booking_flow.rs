//! End-to-end booking flows over the in-memory store

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use hallbook_core::{
    config::BookingConfig,
    models::{BookingStatus, NewBooking, PaymentStatus, Principal, TimeSlot, Venue},
    traits::{BookingRepository, PaymentVerifier},
    AppError,
};
use hallbook_db::{InMemoryBookingRepository, InMemoryVenueCatalog};
use hallbook_services::{
    AnalyticsService, BookingEngine, HmacSha256Verifier, PaymentConfirmationHandler,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const SECRET: &str = "flow-secret";

struct Harness {
    engine: Arc<BookingEngine>,
    payments: PaymentConfirmationHandler,
    analytics: AnalyticsService,
    verifier: HmacSha256Verifier,
    repo: Arc<InMemoryBookingRepository>,
}

fn t(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(10)
}

fn harness() -> Harness {
    let repo = Arc::new(InMemoryBookingRepository::new());
    let catalog = Arc::new(InMemoryVenueCatalog::with_venues([Venue {
        id: 1,
        name: "Grand Hall".to_string(),
        capacity: 200,
        price_per_hour: dec!(10000),
        price_per_day: dec!(70000),
        location: "Downtown".to_string(),
        opens_at: t(9),
        closes_at: t(18),
    }]));
    let verifier = HmacSha256Verifier::new(SECRET);

    let engine = Arc::new(BookingEngine::new(
        repo.clone(),
        catalog.clone(),
        None,
        BookingConfig::default(),
    ));
    let payments = PaymentConfirmationHandler::new(
        repo.clone(),
        Arc::new(verifier.clone()),
        None,
        BookingConfig::default().max_payment_attempts,
    );
    let analytics = AnalyticsService::new(repo.clone(), catalog);

    Harness {
        engine,
        payments,
        analytics,
        verifier,
        repo,
    }
}

fn request(start: u32, end: u32) -> NewBooking {
    NewBooking {
        venue_id: 1,
        booking_date: date(),
        start_time: t(start),
        end_time: t(end),
        idempotency_key: None,
    }
}

#[tokio::test]
async fn test_confirmed_midday_booking_scenario() {
    let h = harness();
    let customer = Principal::customer(1);

    let booking = h.engine.create_booking(&customer, request(12, 15)).await.unwrap();
    let signature = h.verifier.sign(&booking, "pay_mid");
    h.payments
        .confirm_payment(Some(&customer), booking.id, "pay_mid", &signature)
        .await
        .unwrap();

    let slots = h.engine.available_slots(1, date()).await.unwrap();
    assert_eq!(
        slots,
        vec![
            TimeSlot { start_time: t(9), end_time: t(12), available: true },
            TimeSlot { start_time: t(12), end_time: t(15), available: false },
            TimeSlot { start_time: t(15), end_time: t(18), available: true },
        ]
    );

    let err = h
        .engine
        .create_booking(&Principal::customer(2), request(12, 15))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotUnavailable(_)));
    assert_eq!(err.status_code().as_u16(), 409);

    let afternoon = h
        .engine
        .create_booking(&Principal::customer(2), request(15, 18))
        .await
        .unwrap();
    assert_eq!(afternoon.status, BookingStatus::Pending);
    assert_eq!(afternoon.payment_status, PaymentStatus::Pending);
    assert_eq!(afternoon.total_amount, dec!(10000) * Decimal::from(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_admit_one() {
    let h = harness();

    let attempts = (0..8).map(|i| {
        let engine = h.engine.clone();
        tokio::spawn(async move {
            engine
                .create_booking(&Principal::customer(100 + i), request(9, 12))
                .await
        })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::SlotUnavailable(_))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);

    let holding = h
        .repo
        .find_holding_for_date(1, date(), Utc::now())
        .await
        .unwrap();
    assert_eq!(holding.len(), 1);
}

#[tokio::test]
async fn test_cancelling_pending_frees_slot() {
    let h = harness();
    let customer = Principal::customer(5);

    let booking = h.engine.create_booking(&customer, request(9, 12)).await.unwrap();
    let slots = h.engine.available_slots(1, date()).await.unwrap();
    assert!(!slots[0].available);

    h.engine.cancel_booking(&customer, booking.id).await.unwrap();
    let slots = h.engine.available_slots(1, date()).await.unwrap();
    assert!(slots[0].available);

    let err = h.engine.cancel_booking(&customer, booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    // The freed range can be booked again by someone else
    h.engine
        .create_booking(&Principal::customer(6), request(9, 12))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelling_confirmed_keeps_completed_payment() {
    let h = harness();
    let customer = Principal::customer(5);

    let booking = h.engine.create_booking(&customer, request(9, 12)).await.unwrap();
    let signature = h.verifier.sign(&booking, "pay_1");
    assert!(h.verifier.verify(&booking, "pay_1", &signature));
    h.payments
        .confirm_payment(None, booking.id, "pay_1", &signature)
        .await
        .unwrap();

    let cancelled = h.engine.cancel_booking(&customer, booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Completed);

    // A cancelled booking accepts no further payment
    let err = h
        .payments
        .confirm_payment(None, booking.id, "pay_1", &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_failed_payments_release_slot_at_limit() {
    let h = harness();
    let customer = Principal::customer(5);
    let booking = h.engine.create_booking(&customer, request(9, 12)).await.unwrap();

    let limit = BookingConfig::default().max_payment_attempts;
    for _ in 0..limit {
        let err = h
            .payments
            .confirm_payment(Some(&customer), booking.id, "pay_x", "abcd")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentVerification(_)));
    }

    let stored = h.engine.get_booking(&customer, booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert_eq!(stored.payment_attempts, limit);

    let slots = h.engine.available_slots(1, date()).await.unwrap();
    assert!(slots[0].available);
}

#[tokio::test]
async fn test_revenue_counts_only_confirmed() {
    let h = harness();
    let operator = Principal::operator(1);

    h.engine
        .create_booking(&Principal::customer(2), request(9, 10))
        .await
        .unwrap();
    let cancelled = h
        .engine
        .create_booking(&Principal::customer(2), request(10, 11))
        .await
        .unwrap();
    h.engine
        .cancel_booking(&Principal::customer(2), cancelled.id)
        .await
        .unwrap();
    assert_eq!(
        h.analytics.total_revenue(&operator).await.unwrap(),
        Decimal::ZERO
    );

    let paid = h
        .engine
        .create_booking(&Principal::customer(3), request(12, 14))
        .await
        .unwrap();
    let signature = h.verifier.sign(&paid, "pay_paid");
    h.payments
        .confirm_payment(None, paid.id, "pay_paid", &signature)
        .await
        .unwrap();

    assert_eq!(
        h.analytics.total_revenue(&operator).await.unwrap(),
        dec!(20000)
    );
}

#[tokio::test]
async fn test_customer_listings_newest_first() {
    let h = harness();
    let customer = Principal::customer(42);

    let mut later = request(9, 12);
    later.booking_date = date() + Duration::days(1);
    h.engine.create_booking(&customer, request(9, 12)).await.unwrap();
    h.engine.create_booking(&customer, later).await.unwrap();
    h.engine
        .create_booking(&Principal::customer(43), request(12, 15))
        .await
        .unwrap();

    let mine = h.engine.list_for_customer(&customer, 42).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine[0].booking_date > mine[1].booking_date);

    let venue = h
        .engine
        .list_for_venue(&Principal::operator(1), 1)
        .await
        .unwrap();
    assert_eq!(venue.len(), 3);
}
