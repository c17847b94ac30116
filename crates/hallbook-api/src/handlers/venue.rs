//! Venue handlers
//!
//! Availability is public; pricing and per-venue booking lists are operator
//! endpoints.

use crate::dto::{
    ApiResponse, AvailabilityQuery, AvailabilityResponse, AvailableDatesResponse, BookingResponse,
    UpdatePricingRequest,
};
use actix_web::{web, HttpResponse};
use hallbook_auth::OperatorUser;
use hallbook_core::AppError;
use hallbook_services::BookingEngine;
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Slots for a venue on a date
///
/// GET /api/v1/venues/{id}/availability?date=YYYY-MM-DD
#[instrument(skip(engine))]
pub async fn get_availability(
    engine: web::Data<BookingEngine>,
    path: web::Path<i32>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, AppError> {
    let venue_id = path.into_inner();
    let date = query.date;

    let slots = engine.available_slots(venue_id, date).await?;
    debug!(venue_id, %date, slots = slots.len(), "Computed availability");

    Ok(HttpResponse::Ok().json(ApiResponse::success(AvailabilityResponse {
        venue_id,
        date,
        slots,
    })))
}

/// Dates with at least one free slot
///
/// GET /api/v1/venues/{id}/available-dates
#[instrument(skip(engine))]
pub async fn get_available_dates(
    engine: web::Data<BookingEngine>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let venue_id = path.into_inner();
    let dates = engine.available_dates(venue_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(AvailableDatesResponse {
        venue_id,
        dates,
    })))
}

/// Update a venue's rates and capacity
///
/// PUT /api/v1/venues/{id}/pricing
#[instrument(skip(engine, user, req))]
pub async fn update_pricing(
    engine: web::Data<BookingEngine>,
    user: OperatorUser,
    path: web::Path<i32>,
    req: web::Json<UpdatePricingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Pricing update validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let venue = engine
        .update_pricing(&user.principal(), path.into_inner(), req.into_inner().into())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(venue, "Pricing updated")))
}

/// All bookings of a venue
///
/// GET /api/v1/venues/{id}/bookings
#[instrument(skip(engine, user))]
pub async fn list_venue_bookings(
    engine: web::Data<BookingEngine>,
    user: OperatorUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let bookings: Vec<BookingResponse> = engine
        .list_for_venue(&user.principal(), path.into_inner())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(bookings)))
}

/// Configure venue routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/venues")
            .route("/{id}/availability", web::get().to(get_availability))
            .route("/{id}/available-dates", web::get().to(get_available_dates))
            .route("/{id}/pricing", web::put().to(update_pricing))
            .route("/{id}/bookings", web::get().to(list_venue_bookings)),
    );
}
