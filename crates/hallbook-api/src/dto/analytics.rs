//! Analytics DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Monthly revenue query; defaults to the current year
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MonthlyRevenueQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalRevenueResponse {
    pub total_revenue: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_range() {
        assert!(MonthlyRevenueQuery { year: Some(2030) }.validate().is_ok());
        assert!(MonthlyRevenueQuery { year: None }.validate().is_ok());
        assert!(MonthlyRevenueQuery { year: Some(1900) }.validate().is_err());
    }
}
