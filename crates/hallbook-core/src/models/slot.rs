//! Derived availability slot

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::time_format;

/// A candidate interval for a venue and date. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "time_format")]
    pub start_time: NaiveTime,

    #[serde(with = "time_format")]
    pub end_time: NaiveTime,

    pub available: bool,
}
