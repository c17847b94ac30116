//! Booking handlers
//!
//! HTTP handlers for reservation creation, lookup and cancellation, plus the
//! customer-facing payment confirmation.

use crate::dto::{ApiResponse, BookingResponse, CalendarQuery, CreateBookingRequest, VerifyPaymentRequest};
use actix_web::{web, HttpRequest, HttpResponse};
use hallbook_auth::{AuthenticatedUser, OperatorUser};
use hallbook_core::AppError;
use hallbook_services::{BookingEngine, PaymentConfirmationHandler};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Header carrying the client's idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

fn idempotency_key(req: &HttpRequest) -> Result<Option<String>, AppError> {
    req.headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(|s| s.trim().to_string())
                .map_err(|_| AppError::InvalidInput("Idempotency-Key must be ASCII".to_string()))
        })
        .transpose()
}

fn to_responses(bookings: Vec<hallbook_core::models::Booking>) -> Vec<BookingResponse> {
    bookings.into_iter().map(Into::into).collect()
}

/// Create a pending booking
///
/// POST /api/v1/bookings
#[instrument(skip(engine, user, http_req, req))]
pub async fn create_booking(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    http_req: HttpRequest,
    req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Booking validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let key = idempotency_key(&http_req)?;
    let booking = engine
        .create_booking(&user.principal(), req.into_inner().into_new_booking(key))
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        "Booking created, awaiting payment",
    )))
}

/// Caller's own bookings
///
/// GET /api/v1/bookings/my
#[instrument(skip(engine, user))]
pub async fn my_bookings(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let bookings = engine
        .list_for_customer(&user.principal(), user.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(to_responses(bookings))))
}

/// A customer's bookings
///
/// GET /api/v1/bookings/customer/{customer_id}
#[instrument(skip(engine, user))]
pub async fn customer_bookings(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let bookings = engine
        .list_for_customer(&user.principal(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(to_responses(bookings))))
}

/// Non-cancelled bookings of every venue in a date range
///
/// GET /api/v1/bookings/calendar?from=YYYY-MM-DD&to=YYYY-MM-DD
#[instrument(skip(engine, user))]
pub async fn calendar(
    engine: web::Data<BookingEngine>,
    user: OperatorUser,
    query: web::Query<CalendarQuery>,
) -> Result<HttpResponse, AppError> {
    let bookings = engine
        .calendar(&user.principal(), query.from, query.to)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(to_responses(bookings))))
}

/// Single booking
///
/// GET /api/v1/bookings/{id}
#[instrument(skip(engine, user))]
pub async fn get_booking(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let booking = engine
        .get_booking(&user.principal(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// Cancel a booking
///
/// DELETE /api/v1/bookings/{id}
#[instrument(skip(engine, user))]
pub async fn cancel_booking(
    engine: web::Data<BookingEngine>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let booking = engine
        .cancel_booking(&user.principal(), path.into_inner())
        .await?;

    info!(booking_id = %booking.id, user_id = user.user_id, "Booking cancelled via API");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        "Booking cancelled",
    )))
}

/// Submit payment proof for the caller's booking
///
/// POST /api/v1/bookings/verify-payment
#[instrument(skip(payments, user, req))]
pub async fn verify_payment(
    payments: web::Data<PaymentConfirmationHandler>,
    user: AuthenticatedUser,
    req: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Payment verification request invalid: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let principal = user.principal();
    let booking = payments
        .confirm_payment(Some(&principal), req.booking_id, &req.payment_id, &req.signature)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        "Payment verified",
    )))
}

/// Configure booking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::post().to(create_booking))
            .route("/my", web::get().to(my_bookings))
            .route("/calendar", web::get().to(calendar))
            .route("/verify-payment", web::post().to(verify_payment))
            .route("/customer/{customer_id}", web::get().to(customer_bookings))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}", web::delete().to(cancel_booking)),
    );
}
