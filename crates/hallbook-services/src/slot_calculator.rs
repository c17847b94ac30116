//! Slot calculator
//!
//! Pure functions turning a venue's operating hours and the bookings holding
//! a date into fixed-width slots. The last slot of the day is truncated at
//! closing time.

use chrono::{NaiveTime, Timelike};
use hallbook_core::{
    models::{intervals_overlap, Booking, TimeSlot, Venue},
    AppError, AppResult,
};

const SECS_PER_HOUR: u32 = 3600;

/// Fixed-width slot listing
#[derive(Debug, Clone, Copy)]
pub struct SlotCalculator {
    width_hours: u32,
}

impl SlotCalculator {
    /// Calculator producing slots `width_hours` wide; zero is treated as one
    pub fn new(width_hours: u32) -> Self {
        Self {
            width_hours: width_hours.max(1),
        }
    }

    /// Ordered slots spanning `venue`'s operating hours
    ///
    /// A slot is available unless it overlaps one of `holding`. Callers pass
    /// only bookings that hold their range (confirmed or unexpired pending).
    pub fn slots(&self, venue: &Venue, holding: &[Booking]) -> Vec<TimeSlot> {
        self.windows(venue.opens_at, venue.closes_at)
            .into_iter()
            .map(|(start_time, end_time)| TimeSlot {
                start_time,
                end_time,
                available: !holding
                    .iter()
                    .any(|b| intervals_overlap(start_time, end_time, b.start_time, b.end_time)),
            })
            .collect()
    }

    fn windows(&self, opens_at: NaiveTime, closes_at: NaiveTime) -> Vec<(NaiveTime, NaiveTime)> {
        let step = self.width_hours * SECS_PER_HOUR;
        let close = closes_at.num_seconds_from_midnight();
        let mut start = opens_at.num_seconds_from_midnight();
        let mut windows = Vec::new();

        while start < close {
            let end = (start + step).min(close);
            if let (Some(s), Some(e)) = (
                NaiveTime::from_num_seconds_from_midnight_opt(start, 0),
                NaiveTime::from_num_seconds_from_midnight_opt(end, 0),
            ) {
                windows.push((s, e));
            }
            start = end;
        }

        windows
    }

    /// Check a requested `[start, end)` against the booking policy
    ///
    /// Ranges must be hour-aligned, non-empty and inside operating hours.
    pub fn validate_range(venue: &Venue, start: NaiveTime, end: NaiveTime) -> AppResult<()> {
        let on_the_hour = |t: NaiveTime| t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0;

        if !on_the_hour(start) || !on_the_hour(end) {
            return Err(AppError::Validation(format!(
                "booking times must be on the hour, got {}-{}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        if start >= end {
            return Err(AppError::Validation(format!(
                "start time {} must be before end time {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        if !venue.is_within_hours(start, end) {
            return Err(AppError::Validation(format!(
                "{}-{} is outside operating hours {}-{}",
                start.format("%H:%M"),
                end.format("%H:%M"),
                venue.opens_at.format("%H:%M"),
                venue.closes_at.format("%H:%M")
            )));
        }
        Ok(())
    }
}
