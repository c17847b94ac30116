//! Payment DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Gateway proof for a booking, from the customer or the gateway webhook
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    pub booking_id: Uuid,

    /// Gateway transaction id
    #[validate(length(min = 1, max = 200, message = "payment_id is required"))]
    pub payment_id: String,

    /// Hex HMAC-SHA256 signature
    #[validate(length(min = 1, max = 256, message = "signature is required"))]
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_payment_validation() {
        let req = VerifyPaymentRequest {
            booking_id: Uuid::new_v4(),
            payment_id: "pay_1".to_string(),
            signature: "ab".repeat(32),
        };
        assert!(req.validate().is_ok());

        let empty = VerifyPaymentRequest {
            payment_id: String::new(),
            ..req
        };
        assert!(empty.validate().is_err());
    }
}
