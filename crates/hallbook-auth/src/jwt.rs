//! JWT token validation service
//!
//! Validates identity provider tokens using the jsonwebtoken crate.
//! Token creation is kept for tooling and tests that need a signed token.

use crate::claims::Claims;
use chrono::{Duration, Utc};
use hallbook_core::error::AppError;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error, warn};

/// JWT Service for token validation
#[derive(Clone)]
pub struct JwtService {
    /// Default token expiration time in seconds
    expiration_secs: i64,

    /// Encoding key (cached)
    encoding_key: EncodingKey,

    /// Decoding key (cached)
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    ///
    /// # Examples
    ///
    /// ```
    /// use hallbook_auth::JwtService;
    ///
    /// let jwt_service = JwtService::new("my-secret-key", 3600);
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        Self {
            expiration_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create a JWT token from claims
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidToken` if token creation fails
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let mut token_claims = claims.clone();

        // Set expiration if not already set
        if token_claims.exp == 0 {
            let exp = Utc::now() + Duration::seconds(self.expiration_secs);
            token_claims.exp = exp.timestamp();
        }

        debug!(
            user_id = %token_claims.sub,
            role = %token_claims.role,
            exp = %token_claims.exp,
            "Creating JWT token"
        );

        encode(&Header::default(), &token_claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to create JWT token");
            AppError::InvalidToken(format!("Token creation failed: {}", e))
        })
    }

    /// Validate a JWT token and extract claims
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `AppError::TokenExpired` if the token has expired
    /// - `AppError::InvalidToken` if the token is invalid
    ///
    /// # Examples
    ///
    /// ```
    /// use hallbook_auth::{Claims, JwtService};
    /// use hallbook_core::models::Role;
    ///
    /// let jwt_service = JwtService::new("secret", 3600);
    /// let token = jwt_service.create_token(&Claims::new(5, Role::Customer))?;
    /// let decoded = jwt_service.validate_token(&token)?;
    /// assert_eq!(decoded.sub, "5");
    /// # Ok::<(), hallbook_core::error::AppError>(())
    /// ```
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::default();

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    warn!("Token expired");
                    AppError::TokenExpired
                }
                _ => {
                    warn!(error = %e, "Invalid token");
                    AppError::InvalidToken(format!("Token validation failed: {}", e))
                }
            })?;

        let claims = token_data.claims;

        debug!(
            user_id = %claims.sub,
            role = %claims.role,
            "Token validated successfully"
        );

        Ok(claims)
    }

    /// Get the expiration time for tokens created by this service
    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hallbook_core::models::Role;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-12345";

    #[test]
    fn test_create_and_validate_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let token = jwt_service
            .create_token(&Claims::new(12, Role::Operator))
            .unwrap();
        assert!(!token.is_empty());

        let decoded = jwt_service.validate_token(&token).unwrap();
        assert_eq!(decoded.sub, "12");
        assert_eq!(decoded.role, Role::Operator);
    }

    #[test]
    fn test_expired_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 1);

        // Past the default 60s leeway
        let claims = Claims::with_expiration(1, Role::Customer, -600);
        let token = jwt_service.create_token(&claims).unwrap();

        let result = jwt_service.validate_token(&token);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_invalid_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);

        let result = jwt_service.validate_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_token_with_different_secret() {
        let issuer = JwtService::new("secret1", 3600);
        let verifier = JwtService::new("secret2", 3600);

        let token = issuer.create_token(&Claims::new(1, Role::Customer)).unwrap();

        let result = verifier.validate_token(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_debug_impl_hides_secret() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let debug_str = format!("{:?}", jwt_service);

        assert!(debug_str.contains("3600"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(TEST_SECRET));
    }
}
