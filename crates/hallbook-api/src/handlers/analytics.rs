//! Analytics handlers (operator only)

use crate::dto::{ApiResponse, MonthlyRevenueQuery, TotalRevenueResponse};
use actix_web::{web, HttpResponse};
use chrono::{Datelike, Utc};
use hallbook_auth::OperatorUser;
use hallbook_core::AppError;
use hallbook_services::AnalyticsService;
use tracing::{instrument, warn};
use validator::Validate;

/// GET /api/v1/analytics/revenue/total
#[instrument(skip(analytics, user))]
pub async fn total_revenue(
    analytics: web::Data<AnalyticsService>,
    user: OperatorUser,
) -> Result<HttpResponse, AppError> {
    let total_revenue = analytics.total_revenue(&user.principal()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(TotalRevenueResponse { total_revenue })))
}

/// GET /api/v1/analytics/revenue/monthly?year=YYYY
#[instrument(skip(analytics, user))]
pub async fn monthly_revenue(
    analytics: web::Data<AnalyticsService>,
    user: OperatorUser,
    query: web::Query<MonthlyRevenueQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Monthly revenue query invalid: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let months = analytics.monthly_revenue(&user.principal(), year).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(months)))
}

/// GET /api/v1/analytics/revenue/by-venue
#[instrument(skip(analytics, user))]
pub async fn revenue_by_venue(
    analytics: web::Data<AnalyticsService>,
    user: OperatorUser,
) -> Result<HttpResponse, AppError> {
    let rows = analytics.revenue_by_venue(&user.principal()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(rows)))
}

/// GET /api/v1/analytics/bookings/by-venue
#[instrument(skip(analytics, user))]
pub async fn bookings_by_venue(
    analytics: web::Data<AnalyticsService>,
    user: OperatorUser,
) -> Result<HttpResponse, AppError> {
    let rows = analytics.bookings_by_venue(&user.principal()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(rows)))
}

/// GET /api/v1/analytics/payments/funnel
#[instrument(skip(analytics, user))]
pub async fn payment_funnel(
    analytics: web::Data<AnalyticsService>,
    user: OperatorUser,
) -> Result<HttpResponse, AppError> {
    let funnel = analytics.payment_funnel(&user.principal()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(funnel)))
}

/// Configure analytics routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/analytics")
            .route("/revenue/total", web::get().to(total_revenue))
            .route("/revenue/monthly", web::get().to(monthly_revenue))
            .route("/revenue/by-venue", web::get().to(revenue_by_venue))
            .route("/bookings/by-venue", web::get().to(bookings_by_venue))
            .route("/payments/funnel", web::get().to(payment_funnel)),
    );
}
