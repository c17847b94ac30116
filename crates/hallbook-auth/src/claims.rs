//! JWT Claims structure
//!
//! Defines the claims carried by identity provider tokens.

use chrono::{Duration, Utc};
use hallbook_core::error::AppError;
use hallbook_core::models::{Principal, Role};
use serde::{Deserialize, Serialize};

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (numeric user id)
    pub sub: String,

    /// User role
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims for a user; expiration is set by `JwtService`
    ///
    /// # Examples
    ///
    /// ```
    /// use hallbook_auth::Claims;
    /// use hallbook_core::models::Role;
    ///
    /// let claims = Claims::new(42, Role::Operator);
    /// assert_eq!(claims.sub, "42");
    /// ```
    pub fn new(user_id: i32, role: Role) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: 0,
        }
    }

    /// Create new claims with custom expiration duration
    pub fn with_expiration(user_id: i32, role: Role, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in_secs);

        Self {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp();
        self.exp <= now
    }

    /// Request principal for these claims
    ///
    /// Fails with `InvalidToken` if the subject is not a user id.
    pub fn principal(&self) -> Result<Principal, AppError> {
        let user_id = self
            .sub
            .parse::<i32>()
            .map_err(|_| AppError::InvalidToken(format!("subject '{}' is not a user id", self.sub)))?;

        Ok(Principal {
            user_id,
            role: self.role,
        })
    }
}
