//! `HH:MM` serialization for wall-clock times
//!
//! Booking and slot times are hour-granular and travel as `"09:00"`.
//! Parsing also accepts `"09:00:00"`.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%H:%M";

/// Parse a `HH:MM` or `HH:MM:SS` string
pub fn parse(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Format a time as `HH:MM`
pub fn format(time: &NaiveTime) -> String {
    time.format(FORMAT).to_string()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_forms() {
        let expected = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(parse("09:00"), Some(expected));
        assert_eq!(parse("09:00:00"), Some(expected));
        assert_eq!(parse("9am"), None);
    }

    #[test]
    fn test_format() {
        let time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        assert_eq!(format(&time), "15:00");
    }
}
