//! Actix-web request extractors
//!
//! Turn a bearer token into the request's [`Principal`]. Operator-only
//! endpoints use [`OperatorUser`], which rejects customers with 403.

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use hallbook_core::error::AppError;
use hallbook_core::models::{Principal, Role};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extract JWT token from request
///
/// Checks for token in the following order:
/// 1. Authorization header (Bearer token)
/// 2. Cookie named "token"
fn extract_token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie) = req.cookie("token") {
        return Some(cookie.value().to_string());
    }

    None
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let jwt_service = req
        .app_data::<web::Data<Arc<JwtService>>>()
        .map(|service| service.get_ref().clone())
        .ok_or_else(|| {
            warn!("JwtService not found in app data");
            AppError::Unauthorized("Authentication service not configured".to_string())
        })?;

    let token = extract_token_from_request(req).ok_or_else(|| {
        debug!("No authentication token found in request");
        AppError::Unauthorized("No authentication token provided".to_string())
    })?;

    let claims = jwt_service.validate_token(&token)?;
    let principal = claims.principal()?;

    debug!(
        user_id = principal.user_id,
        role = %principal.role,
        "User authenticated successfully"
    );

    Ok(AuthenticatedUser {
        user_id: principal.user_id,
        role: principal.role,
        claims,
    })
}

/// Authenticated caller
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use hallbook_auth::middleware::AuthenticatedUser;
///
/// async fn protected_handler(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().body(format!("{} as {}", user.user_id, user.role))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Identity provider user id
    pub user_id: i32,

    pub role: Role,

    /// Full claims from the JWT token
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// Principal passed into engine operations
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            role: self.role,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(|e| {
            warn!(error = %e, "Authentication failed");
            actix_web::Error::from(e)
        }))
    }
}

/// Operator extractor
///
/// Returns `Forbidden` if the caller is authenticated but not an operator.
#[derive(Debug, Clone)]
pub struct OperatorUser(pub AuthenticatedUser);

impl std::ops::Deref for OperatorUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for OperatorUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = match authenticate(req) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Authentication failed");
                return ready(Err(e.into()));
            }
        };

        if !user.is_operator() {
            warn!(
                user_id = user.user_id,
                role = %user.role,
                "User attempted operator access without privileges"
            );
            return ready(Err(AppError::Forbidden(
                "operator role required".to_string(),
            )
            .into()));
        }

        debug!(user_id = user.user_id, "Operator access granted");

        ready(Ok(OperatorUser(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    fn create_test_jwt_service() -> Arc<JwtService> {
        Arc::new(JwtService::new("test-secret-key-12345", 3600))
    }

    fn token_for(jwt: &JwtService, user_id: i32, role: Role) -> String {
        jwt.create_token(&Claims::new(user_id, role)).unwrap()
    }

    #[actix_web::test]
    async fn test_extract_token_from_authorization_header() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, 21, Role::Customer);

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/test",
            web::get().to(|user: AuthenticatedUser| async move {
                assert_eq!(user.principal(), Principal::customer(21));
                "OK"
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_missing_token() {
        let jwt_service = create_test_jwt_service();

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/test",
            web::get().to(|_user: AuthenticatedUser| async { "OK" }),
        ))
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_invalid_token() {
        let jwt_service = create_test_jwt_service();

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/test",
            web::get().to(|_user: AuthenticatedUser| async { "OK" }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", "Bearer invalid.token.here"))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_operator_user_with_operator_role() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, 1, Role::Operator);

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/ops",
            web::get().to(|operator: OperatorUser| async move {
                assert!(operator.principal().is_operator());
                "OK"
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/ops")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_operator_user_with_customer_role() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, 2, Role::Customer);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt_service))
                .route("/ops", web::get().to(|_op: OperatorUser| async { "OK" })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ops")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn test_token_from_cookie() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, 3, Role::Customer);

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/test",
            web::get().to(|user: AuthenticatedUser| async move {
                assert_eq!(user.user_id, 3);
                "OK"
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .cookie(actix_web::cookie::Cookie::new("token", token))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
