//! Payment confirmation
//!
//! Applies payment gateway proofs to pending bookings. The gateway signs
//! `{booking_id}|{payment_id}|{amount_minor}|{venue_id}` with HMAC-SHA256
//! over a shared secret and sends the hex digest along with its
//! transaction id.

use chrono::Utc;
use hallbook_core::{
    models::{Booking, BookingStatus, BookingTransition, PaymentRecord, Principal},
    traits::{AvailabilityCache, BookingRepository, PaymentVerifier},
    AppError, AppResult,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::booking_engine::invalidate_available_dates;

type HmacSha256 = Hmac<Sha256>;

/// Gateway signature check over a shared secret
#[derive(Clone)]
pub struct HmacSha256Verifier {
    secret: Vec<u8>,
}

impl fmt::Debug for HmacSha256Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSha256Verifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl HmacSha256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Message the gateway signs for `booking`
    ///
    /// `None` when the total cannot be expressed in minor units; such a
    /// booking can never be paid.
    pub fn payload(booking: &Booking, payment_id: &str) -> Option<String> {
        let amount = booking.amount_minor_units()?;
        Some(format!(
            "{}|{}|{}|{}",
            booking.id, payment_id, amount, booking.venue_id
        ))
    }

    fn mac(&self, booking: &Booking, payment_id: &str) -> Option<HmacSha256> {
        let payload = Self::payload(booking, payment_id)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(payload.as_bytes());
        Some(mac)
    }

    /// Hex signature as the gateway would produce it
    pub fn sign(&self, booking: &Booking, payment_id: &str) -> String {
        self.mac(booking, payment_id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }
}

impl PaymentVerifier for HmacSha256Verifier {
    fn verify(&self, booking: &Booking, payment_id: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        match self.mac(booking, payment_id) {
            // Constant time comparison
            Some(mac) => mac.verify_slice(&expected).is_ok(),
            None => false,
        }
    }
}

/// Payment confirmation handler
pub struct PaymentConfirmationHandler {
    bookings: Arc<dyn BookingRepository>,
    verifier: Arc<dyn PaymentVerifier>,
    cache: Option<Arc<dyn AvailabilityCache>>,
    max_attempts: i32,
}

impl PaymentConfirmationHandler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        verifier: Arc<dyn PaymentVerifier>,
        cache: Option<Arc<dyn AvailabilityCache>>,
        max_attempts: i32,
    ) -> Self {
        Self {
            bookings,
            verifier,
            cache,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Apply a gateway proof to a booking
    ///
    /// `principal` is `None` for the gateway webhook; otherwise the caller must
    /// own the booking or be an operator.
    ///
    /// A valid proof confirms a pending booking. An invalid proof from the
    /// booking's owner or an operator marks the payment failed and counts an
    /// attempt; the booking is cancelled once the attempt limit is reached.
    /// Invalid proofs on the unauthenticated webhook are rejected without
    /// touching the booking. Replaying the recorded proof on a confirmed
    /// booking returns it unchanged.
    ///
    /// # Errors
    ///
    /// - `PaymentVerification` when the signature does not verify
    /// - `InvalidState` for cancelled or expired bookings and for a different
    ///   proof on a confirmed booking
    #[instrument(skip(self, principal, signature))]
    pub async fn confirm_payment(
        &self,
        principal: Option<&Principal>,
        booking_id: Uuid,
        payment_id: &str,
        signature: &str,
    ) -> AppResult<Booking> {
        if payment_id.trim().is_empty() || signature.trim().is_empty() {
            return Err(AppError::Validation(
                "payment_id and signature are required".to_string(),
            ));
        }

        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        if let Some(principal) = principal {
            if !principal.can_access(booking.customer_id) {
                warn!(
                    "User {} attempted to pay booking {} owned by {}",
                    principal.user_id, booking_id, booking.customer_id
                );
                return Err(AppError::Forbidden(format!(
                    "booking {} belongs to another customer",
                    booking_id
                )));
            }
        }

        match booking.status {
            BookingStatus::Confirmed => self.replay(booking, payment_id, signature),
            BookingStatus::Cancelled => Err(AppError::InvalidState(format!(
                "booking {} is cancelled",
                booking_id
            ))),
            BookingStatus::Pending => {
                self.apply(booking, principal.is_some(), payment_id, signature)
                    .await
            }
        }
    }

    fn replay(&self, booking: Booking, payment_id: &str, signature: &str) -> AppResult<Booking> {
        let same_payment = booking
            .payment
            .as_ref()
            .is_some_and(|p| p.payment_id == payment_id);

        if same_payment && self.verifier.verify(&booking, payment_id, signature) {
            debug!("Payment {} already applied to booking {}", payment_id, booking.id);
            Ok(booking)
        } else {
            Err(AppError::InvalidState(format!(
                "booking {} is already paid",
                booking.id
            )))
        }
    }

    async fn apply(
        &self,
        booking: Booking,
        authenticated: bool,
        payment_id: &str,
        signature: &str,
    ) -> AppResult<Booking> {
        let now = Utc::now();

        if booking.is_expired_pending(now) {
            let expire = BookingTransition::cancel(booking.payment_status);
            match self
                .bookings
                .apply_transition(booking.id, BookingStatus::Pending, &expire)
                .await
            {
                Ok(_) | Err(AppError::InvalidState(_)) => {}
                Err(e) => return Err(e),
            }
            info!("Booking {} expired before payment {}", booking.id, payment_id);
            invalidate_available_dates(self.cache.as_ref(), booking.venue_id).await;
            return Err(AppError::InvalidState(format!(
                "payment window for booking {} has expired",
                booking.id
            )));
        }

        if !self.verifier.verify(&booking, payment_id, signature) {
            warn!(
                booking_id = %booking.id,
                payment_id = %payment_id,
                venue_id = booking.venue_id,
                authenticated,
                "Payment signature mismatch, potential tamper attempt"
            );

            // Only the customer's own attempts count towards the limit
            if !authenticated {
                return Err(AppError::PaymentVerification(format!(
                    "signature rejected for booking {}",
                    booking.id
                )));
            }

            let failed = self
                .bookings
                .apply_transition(
                    booking.id,
                    BookingStatus::Pending,
                    &BookingTransition::payment_failed(self.max_attempts),
                )
                .await?;

            if failed.status == BookingStatus::Cancelled {
                info!(
                    "Booking {} cancelled after {} failed payment attempts",
                    failed.id, failed.payment_attempts
                );
                invalidate_available_dates(self.cache.as_ref(), failed.venue_id).await;
            }

            return Err(AppError::PaymentVerification(format!(
                "signature rejected for booking {} (attempt {} of {})",
                booking.id, failed.payment_attempts, self.max_attempts
            )));
        }

        let record = PaymentRecord {
            payment_id: payment_id.to_string(),
            signature: signature.trim().to_string(),
            verified_at: now,
        };

        match self
            .bookings
            .apply_transition(booking.id, BookingStatus::Pending, &BookingTransition::confirm(record))
            .await
        {
            Ok(confirmed) => {
                info!(
                    "Booking {} confirmed with payment {} amount {}",
                    confirmed.id, payment_id, confirmed.total_amount
                );
                Ok(confirmed)
            }
            Err(AppError::InvalidState(msg)) => {
                // A concurrent confirmation with the same proof won the race
                let current = self
                    .bookings
                    .find_by_id(booking.id)
                    .await?
                    .ok_or_else(|| AppError::BookingNotFound(booking.id.to_string()))?;
                if current.status == BookingStatus::Confirmed {
                    self.replay(current, payment_id, signature)
                } else {
                    Err(AppError::InvalidState(msg))
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use hallbook_core::models::{NewBooking, PaymentStatus};
    use hallbook_db::InMemoryBookingRepository;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const SECRET: &str = "gateway-secret";

    fn pending_booking(customer_id: i32) -> Booking {
        let request = NewBooking {
            venue_id: 4,
            booking_date: Utc::now().date_naive() + Duration::days(3),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            idempotency_key: None,
        };
        Booking::new_pending(customer_id, &request, dec!(30000), 900)
    }

    async fn setup(max_attempts: i32) -> (PaymentConfirmationHandler, HmacSha256Verifier, Booking) {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let booking = repo.insert_if_free(&pending_booking(8)).await.unwrap();
        let verifier = HmacSha256Verifier::new(SECRET);
        let handler = PaymentConfirmationHandler::new(
            repo,
            Arc::new(verifier.clone()),
            None,
            max_attempts,
        );
        (handler, verifier, booking)
    }

    #[test]
    fn test_payload_format() {
        let mut booking = pending_booking(1);
        booking.total_amount = dec!(1499.99);
        let payload = HmacSha256Verifier::payload(&booking, "pay_123");
        assert_eq!(payload, Some(format!("{}|pay_123|149999|4", booking.id)));
    }

    #[test]
    fn test_unrepresentable_amount_never_verifies() {
        let verifier = HmacSha256Verifier::new(SECRET);
        let mut booking = pending_booking(1);
        let signature = verifier.sign(&booking, "pay_1");

        booking.total_amount = Decimal::MAX;
        assert_eq!(HmacSha256Verifier::payload(&booking, "pay_1"), None);
        assert_eq!(verifier.sign(&booking, "pay_1"), "");
        assert!(!verifier.verify(&booking, "pay_1", &signature));
    }

    #[test]
    fn test_verify_signature() {
        let verifier = HmacSha256Verifier::new(SECRET);
        let booking = pending_booking(1);
        let signature = verifier.sign(&booking, "pay_1");

        assert_eq!(signature.len(), 64);
        assert!(verifier.verify(&booking, "pay_1", &signature));
        assert!(verifier.verify(&booking, "pay_1", &signature.to_uppercase()));
        assert!(!verifier.verify(&booking, "pay_2", &signature));
        assert!(!verifier.verify(&booking, "pay_1", "not-hex"));

        let other = HmacSha256Verifier::new("other-secret");
        assert!(!other.verify(&booking, "pay_1", &signature));

        let mut tampered = booking.clone();
        tampered.total_amount = dec!(1);
        assert!(!verifier.verify(&tampered, "pay_1", &signature));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", HmacSha256Verifier::new(SECRET));
        assert!(!debug.contains(SECRET));
    }

    #[tokio::test]
    async fn test_valid_proof_confirms() {
        let (handler, verifier, booking) = setup(3).await;
        let signature = verifier.sign(&booking, "pay_1");

        let confirmed = handler
            .confirm_payment(None, booking.id, "pay_1", &signature)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Completed);
        assert_eq!(confirmed.payment.as_ref().unwrap().payment_id, "pay_1");
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let (handler, verifier, booking) = setup(3).await;
        let signature = verifier.sign(&booking, "pay_1");

        let first = handler
            .confirm_payment(None, booking.id, "pay_1", &signature)
            .await
            .unwrap();
        let second = handler
            .confirm_payment(None, booking.id, "pay_1", &signature)
            .await
            .unwrap();
        assert_eq!(first.updated_at, second.updated_at);
        assert_eq!(second.status, BookingStatus::Confirmed);

        let other = verifier.sign(&booking, "pay_2");
        let err = handler
            .confirm_payment(None, booking.id, "pay_2", &other)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_bad_signature_then_retry_succeeds() {
        let (handler, verifier, booking) = setup(3).await;

        let err = handler
            .confirm_payment(Some(&Principal::customer(8)), booking.id, "pay_1", "deadbeef")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentVerification(_)));

        let signature = verifier.sign(&booking, "pay_1");
        let confirmed = handler
            .confirm_payment(None, booking.id, "pay_1", &signature)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_attempts, 1);
    }

    #[tokio::test]
    async fn test_attempt_limit_cancels_booking() {
        let (handler, verifier, booking) = setup(2).await;

        for _ in 0..2 {
            let err = handler
                .confirm_payment(Some(&Principal::customer(8)), booking.id, "pay_1", "00")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::PaymentVerification(_)));
        }

        let signature = verifier.sign(&booking, "pay_1");
        let err = handler
            .confirm_payment(None, booking.id, "pay_1", &signature)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_webhook_rejections_do_not_count_attempts() {
        let (handler, verifier, booking) = setup(3).await;

        for _ in 0..5 {
            let err = handler
                .confirm_payment(None, booking.id, "pay_1", "00")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::PaymentVerification(_)));
        }

        let stored = handler.bookings.find_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stored.payment_attempts, 0);

        let signature = verifier.sign(&booking, "pay_1");
        let confirmed = handler
            .confirm_payment(Some(&Principal::customer(8)), booking.id, "pay_1", &signature)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_principal_must_own_booking() {
        let (handler, verifier, booking) = setup(3).await;
        let signature = verifier.sign(&booking, "pay_1");

        let err = handler
            .confirm_payment(Some(&Principal::customer(99)), booking.id, "pay_1", &signature)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let confirmed = handler
            .confirm_payment(Some(&Principal::customer(8)), booking.id, "pay_1", &signature)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_expired_pending_is_cancelled() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let mut stale = pending_booking(8);
        stale.booking_date = NaiveDate::from_ymd_opt(2031, 1, 10).unwrap();
        stale.expires_at = Utc::now() - Duration::seconds(5);
        let stale = repo.insert_if_free(&stale).await.unwrap();

        let verifier = HmacSha256Verifier::new(SECRET);
        let handler =
            PaymentConfirmationHandler::new(repo.clone(), Arc::new(verifier.clone()), None, 3);
        let signature = verifier.sign(&stale, "pay_1");

        let err = handler
            .confirm_payment(None, stale.id, "pay_1", &signature)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let stored = repo.find_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_blank_proof_and_unknown_booking() {
        let (handler, _, booking) = setup(3).await;

        let err = handler
            .confirm_payment(None, booking.id, "", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = handler
            .confirm_payment(None, Uuid::new_v4(), "pay_1", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
    }
}
