//! API layer for Hallbook
//!
//! HTTP handlers for availability, reservations, payment confirmation and
//! operator analytics. Handlers extract the caller's principal and delegate
//! to the services in `hallbook-services`.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

use actix_web::{error::Error as ActixError, web, HttpRequest};
use hallbook_core::AppError;
use tracing::debug;

// Re-export DTOs (common types)
pub use dto::ApiResponse;

pub use handlers::{
    configure_analytics, configure_bookings, configure_health, configure_payments,
    configure_venues,
};

/// Mount every API route under `/api/v1`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(configure_health)
            .configure(configure_venues)
            .configure(configure_bookings)
            .configure(configure_payments)
            .configure(configure_analytics),
    );
}

fn bad_request(kind: &str, err: impl std::fmt::Display, req: &HttpRequest) -> ActixError {
    debug!(path = %req.path(), "Rejected {}: {}", kind, err);
    AppError::Validation(format!("invalid {}: {}", kind, err)).into()
}

/// JSON body extractor config reporting malformed bodies as validation errors
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, req| bad_request("request body", err, req))
}

/// Query extractor config reporting malformed queries as validation errors
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req| bad_request("query", err, req))
}

/// Path extractor config reporting malformed path segments as validation errors
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req| bad_request("path", err, req))
}
