use serde::{Deserialize, Serialize};

use super::interval::Interval;
use super::types::ProviderId;

/// Maximum number of bars a quote response carries.
pub const MAX_BARS: usize = 100;

/// Request context handed to provider adapters.
///
/// The credential is looked up by the fetcher right before the call so that
/// keys updated at runtime take effect on the next request.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext<'a> {
    /// Symbol as typed by the user (e.g. `AAPL`, `^GSPC`, `BTC-USD`)
    pub symbol: &'a str,

    /// API key for the provider being called, if one is configured
    pub credential: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn new(symbol: &'a str, credential: Option<&'a str>) -> Self {
        Self { symbol, credential }
    }
}

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, seconds since the Unix epoch
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume, zero when the provider does not report it
    pub volume: u64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Normalized quote history for one symbol from exactly one provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub interval: Interval,
    /// Provider the bars came from
    pub source: ProviderId,
    /// Bars ordered oldest to newest
    #[serde(rename = "data")]
    pub bars: Vec<Bar>,
}

impl QuoteResponse {
    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

/// Sort by timestamp, drop repeated timestamps (the later record wins) and
/// keep the newest `max_bars`.
pub fn normalize_bars(mut bars: Vec<Bar>, max_bars: usize) -> Vec<Bar> {
    // Stable sort keeps provider order among equal timestamps
    bars.sort_by_key(|b| b.timestamp);

    let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => deduped.push(bar),
        }
    }

    if deduped.len() > max_bars {
        deduped.drain(..deduped.len() - max_bars);
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 10)
    }

    #[test]
    fn test_normalize_sorts_ascending() {
        let bars = vec![bar(300, 3.0), bar(100, 1.0), bar(200, 2.0)];
        let out = normalize_bars(bars, MAX_BARS);
        let ts: Vec<i64> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![100, 200, 300]);
    }

    #[test]
    fn test_normalize_keeps_most_recent() {
        let bars: Vec<Bar> = (0..150).rev().map(|i| bar(i * 60, i as f64 + 1.0)).collect();
        let out = normalize_bars(bars, MAX_BARS);
        assert_eq!(out.len(), MAX_BARS);
        assert_eq!(out.first().unwrap().timestamp, 50 * 60);
        assert_eq!(out.last().unwrap().timestamp, 149 * 60);
    }

    #[test]
    fn test_normalize_drops_duplicate_timestamps() {
        let bars = vec![bar(100, 1.0), bar(100, 5.0), bar(200, 2.0)];
        let out = normalize_bars(bars, MAX_BARS);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].close, 5.0);
    }

    #[test]
    fn test_serialized_shape() {
        let response = QuoteResponse {
            symbol: "AAPL".to_string(),
            interval: Interval::OneDay,
            source: Cow::Borrowed("FINNHUB"),
            bars: vec![bar(100, 1.0)],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["interval"], "1D");
        assert_eq!(json["source"], "FINNHUB");
        assert_eq!(json["data"][0]["timestamp"], 100);
    }
}
