use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Seconds in a 365-day year, used to annualize per-bar statistics.
const SECS_PER_YEAR: f64 = 31_536_000.0;

/// A fixed bar interval, stored as a whole number of seconds.
///
/// Parsed from compact labels such as `"1s"`, `"1m"`, `"5m"`, `"1h"` or
/// `"1d"`; `Display` renders the canonical label back. A `Timeframe` is the
/// unit every bar series is aligned to: bar timestamps are always floored to
/// a multiple of the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeframe {
    secs: u32,
}

impl Timeframe {
    /// Builds a timeframe from a number of seconds. Zero is rejected.
    pub fn from_secs(secs: u32) -> Result<Self, CoreError> {
        if secs == 0 {
            return Err(CoreError::InvalidTimeframe("0s".to_string()));
        }
        Ok(Self { secs })
    }

    pub fn secs(&self) -> u32 {
        self.secs
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.secs))
    }

    /// Aligns a timestamp down to the start of the interval containing it.
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = i64::from(self.secs);
        let aligned = ts.timestamp().div_euclid(secs) * secs;
        DateTime::from_timestamp(aligned, 0).expect("aligned timestamp within chrono range")
    }

    /// Number of intervals in a 365-day year, for annualizing volatility
    /// (1s bars -> 31,536,000; 1m -> 525,600; 5m -> 105,120).
    pub fn periods_per_year(&self) -> f64 {
        SECS_PER_YEAR / f64::from(self.secs)
    }

    /// The canonical label, e.g. `"5m"`. Used as the persisted key.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.secs;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidTimeframe(s.to_string());
        let unit = s.chars().last().ok_or_else(invalid)?;
        let digits = &s[..s.len() - unit.len_utf8()];
        let count: u32 = digits.parse().map_err(|_| invalid())?;
        let mult = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return Err(invalid()),
        };
        let secs = count.checked_mul(mult).ok_or_else(invalid)?;
        Self::from_secs(secs).map_err(|_| invalid())
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_common_labels() {
        assert_eq!("1s".parse::<Timeframe>().unwrap().secs(), 1);
        assert_eq!("1m".parse::<Timeframe>().unwrap().secs(), 60);
        assert_eq!("5m".parse::<Timeframe>().unwrap().secs(), 300);
        assert_eq!("1h".parse::<Timeframe>().unwrap().secs(), 3_600);
        assert_eq!("1d".parse::<Timeframe>().unwrap().secs(), 86_400);
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!("".parse::<Timeframe>().is_err());
        assert!("m".parse::<Timeframe>().is_err());
        assert!("0m".parse::<Timeframe>().is_err());
        assert!("5x".parse::<Timeframe>().is_err());
        assert!("-1m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for label in ["30s", "1m", "5m", "2h", "1d"] {
            let tf: Timeframe = label.parse().unwrap();
            assert_eq!(tf.to_string(), label);
        }
    }

    #[test]
    fn floor_aligns_to_interval_start() {
        let tf: Timeframe = "1m".parse().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 7, 42).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 7, 0).unwrap();
        assert_eq!(tf.floor(ts), expected);
        // Already-aligned timestamps are fixed points.
        assert_eq!(tf.floor(expected), expected);
    }

    #[test]
    fn periods_per_year_matches_spec_examples() {
        assert_eq!("1s".parse::<Timeframe>().unwrap().periods_per_year(), 31_536_000.0);
        assert_eq!("1m".parse::<Timeframe>().unwrap().periods_per_year(), 525_600.0);
        assert_eq!("5m".parse::<Timeframe>().unwrap().periods_per_year(), 105_120.0);
    }
}
