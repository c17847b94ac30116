//! Authentication and authorization for Hallbook
//!
//! Tokens are issued by the identity provider. This crate validates them and
//! turns each request into an explicit [`Principal`](hallbook_core::models::Principal)
//! that handlers pass into every engine operation.
//!
//! # Using extractors in Actix-web
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use hallbook_auth::{AuthenticatedUser, OperatorUser};
//!
//! async fn my_bookings(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().body(user.user_id.to_string())
//! }
//!
//! async fn calendar(_operator: OperatorUser) -> HttpResponse {
//!     HttpResponse::Ok().finish()
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{AuthenticatedUser, OperatorUser};
