use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Bar interval requested by callers.
///
/// The set is closed: anything other than `1m`, `30m` or `1D` is rejected
/// when parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1D")]
    OneDay,
}

impl Interval {
    pub const ALL: &'static [Interval] =
        &[Interval::OneMinute, Interval::ThirtyMinutes, Interval::OneDay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneDay => "1D",
        }
    }

    /// How far back to ask a provider so that it can fill up to 100 bars.
    pub fn lookback(&self) -> Duration {
        match self {
            Interval::OneMinute => Duration::days(1),
            Interval::ThirtyMinutes => Duration::days(5),
            Interval::OneDay => Duration::days(365),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Interval::OneMinute),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1D" => Ok(Interval::OneDay),
            other => Err(MarketDataError::InvalidInterval(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_intervals() {
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::OneMinute);
        assert_eq!("30m".parse::<Interval>().unwrap(), Interval::ThirtyMinutes);
        assert_eq!("1D".parse::<Interval>().unwrap(), Interval::OneDay);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("1d".parse::<Interval>().is_err());
        assert!("30M".parse::<Interval>().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_interval() {
        let err = "5m".parse::<Interval>().unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidInterval(ref s) if s == "5m"));
        assert!("1H".parse::<Interval>().is_err());
    }

    #[test]
    fn test_lookback_windows() {
        assert_eq!(Interval::OneMinute.lookback(), Duration::days(1));
        assert_eq!(Interval::ThirtyMinutes.lookback(), Duration::days(5));
        assert_eq!(Interval::OneDay.lookback(), Duration::days(365));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Interval::OneDay).unwrap();
        assert_eq!(json, "\"1D\"");
        let parsed: Interval = serde_json::from_str("\"30m\"").unwrap();
        assert_eq!(parsed, Interval::ThirtyMinutes);
    }
}
