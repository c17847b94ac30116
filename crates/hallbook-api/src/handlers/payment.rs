//! Payment gateway webhook
//!
//! The gateway is not a user of the system; the HMAC signature is the only
//! credential and is checked by the confirmation handler.

use crate::dto::{ApiResponse, BookingResponse, VerifyPaymentRequest};
use actix_web::{web, HttpResponse};
use hallbook_core::AppError;
use hallbook_services::PaymentConfirmationHandler;
use tracing::{instrument, warn};
use validator::Validate;

/// Gateway callback
///
/// POST /api/v1/payments/webhook
#[instrument(skip(payments, req), fields(booking_id = %req.booking_id))]
pub async fn payment_webhook(
    payments: web::Data<PaymentConfirmationHandler>,
    req: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Payment webhook payload invalid: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let booking = payments
        .confirm_payment(None, req.booking_id, &req.payment_id, &req.signature)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/payments").route("/webhook", web::post().to(payment_webhook)));
}
