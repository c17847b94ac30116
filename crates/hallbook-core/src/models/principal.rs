//! Authenticated caller
//!
//! Produced per request by the auth extractors and passed explicitly into
//! every engine operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ordinary customer, sees only own bookings
    #[default]
    Customer,
    /// Administrative principal: all bookings, pricing and analytics
    Operator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Operator => write!(f, "operator"),
        }
    }
}

impl Role {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "customer" | "user" => Some(Role::Customer),
            "operator" | "admin" => Some(Role::Operator),
            _ => None,
        }
    }
}

/// Identity of the caller for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i32,
    pub role: Role,
}

impl Principal {
    pub fn customer(user_id: i32) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn operator(user_id: i32) -> Self {
        Self {
            user_id,
            role: Role::Operator,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }

    /// Owner or operator
    pub fn can_access(&self, customer_id: i32) -> bool {
        self.is_operator() || self.user_id == customer_id
    }
}
