//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from Alpha Vantage API:
//! - Intraday bars via TIME_SERIES_INTRADAY (1min, 30min)
//! - Daily bars via TIME_SERIES_DAILY
//! - Current price via GLOBAL_QUOTE
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute, and
//! rate limiting is reported in the body ("Note"/"Information"), not with 429.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Bar, Interval, RequestContext};
use crate::provider::http::{self, DEFAULT_TIMEOUT};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// TIME_SERIES_INTRADAY / TIME_SERIES_DAILY response.
///
/// The series key depends on the function ("Time Series (1min)",
/// "Time Series (Daily)", ...), so it is captured through `flatten`.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Meta Data")]
    meta: Option<HashMap<String, String>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume", default)]
    volume: Option<String>,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<HashMap<String, String>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

// ============================================================================
// AlphaVantageProvider
// ============================================================================

/// Alpha Vantage market data provider.
///
/// Free tier is limited to 5 API calls per minute.
pub struct AlphaVantageProvider {
    client: Client,
}

impl AlphaVantageProvider {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, api_key: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", api_key));

        let url = reqwest::Url::parse_with_params(BASE_URL, &all_params).map_err(|e| {
            MarketDataError::provider_error(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(api_key, "***")
        );

        http::send(PROVIDER_ID, self.client.get(url), &[]).await
    }
}

impl Default for AlphaVantageProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn is_rate_limit_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("api call frequency") || msg.contains("rate limit")
}

/// Check for API-level errors in the response.
fn check_api_error(
    error_message: &Option<String>,
    note: &Option<String>,
    information: &Option<String>,
) -> Result<(), MarketDataError> {
    if let Some(ref msg) = error_message {
        if msg.contains("Invalid API call") {
            return Err(MarketDataError::NoData {
                provider: PROVIDER_ID.to_string(),
            });
        }
        return Err(MarketDataError::provider_error(PROVIDER_ID, msg.clone()));
    }

    for msg in [note, information].into_iter().flatten() {
        if is_rate_limit_message(msg) {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        warn!("Alpha Vantage message: {}", msg);
    }

    Ok(())
}

/// Request parameters for an interval.
fn series_params(interval: Interval) -> Vec<(&'static str, &'static str)> {
    match interval {
        Interval::OneMinute => vec![
            ("function", "TIME_SERIES_INTRADAY"),
            ("interval", "1min"),
            ("outputsize", "compact"),
        ],
        Interval::ThirtyMinutes => vec![
            ("function", "TIME_SERIES_INTRADAY"),
            ("interval", "30min"),
            ("outputsize", "compact"),
        ],
        // 'full' is premium-only
        Interval::OneDay => vec![("function", "TIME_SERIES_DAILY"), ("outputsize", "compact")],
    }
}

/// Time zone named in the metadata ("6. Time Zone" intraday, "5. Time Zone"
/// daily). Defaults to UTC when absent or unknown.
fn meta_time_zone(meta: Option<&HashMap<String, String>>) -> Tz {
    meta.and_then(|m| {
        m.iter()
            .find(|(k, _)| k.ends_with("Time Zone"))
            .map(|(_, v)| v)
    })
    .and_then(|name| match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            warn!("Alpha Vantage: unknown time zone '{}', using UTC", name);
            None
        }
    })
    .unwrap_or(Tz::UTC)
}

/// Parse a series key (`2024-01-02 15:30:00` or `2024-01-02`) in `tz`.
fn parse_timestamp(raw: &str, tz: Tz) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

fn parse_entry(timestamp: i64, value: serde_json::Value) -> Option<Bar> {
    let entry: SeriesEntry = serde_json::from_value(value).ok()?;
    let volume = entry
        .volume
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    Some(Bar::new(
        timestamp,
        entry.open.parse().ok()?,
        entry.high.parse().ok()?,
        entry.low.parse().ok()?,
        entry.close.parse().ok()?,
        volume,
    ))
}

/// Parse a TIME_SERIES_* body into bars.
fn parse_time_series(text: &str) -> Result<Vec<Bar>, MarketDataError> {
    let response: TimeSeriesResponse = http::parse_json(PROVIDER_ID, text)?;

    check_api_error(
        &response.error_message,
        &response.note,
        &response.information,
    )?;

    let tz = meta_time_zone(response.meta.as_ref());

    let series = response
        .rest
        .into_iter()
        .find(|(k, _)| k.starts_with("Time Series"))
        .and_then(|(_, v)| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .ok_or_else(|| MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        })?;

    let total = series.len();
    let bars: Vec<Bar> = series
        .into_iter()
        .filter_map(|(key, value)| parse_entry(parse_timestamp(&key, tz)?, value))
        .collect();

    if bars.len() < total {
        warn!(
            "Alpha Vantage: skipped {} malformed entries out of {}",
            total - bars.len(),
            total
        );
    }

    Ok(bars)
}

/// Parse a GLOBAL_QUOTE body into the current price.
fn parse_global_quote(text: &str) -> Result<f64, MarketDataError> {
    let response: GlobalQuoteResponse = http::parse_json(PROVIDER_ID, text)?;

    check_api_error(
        &response.error_message,
        &response.note,
        &response.information,
    )?;

    // Unknown symbols come back as an empty "Global Quote" object
    response
        .global_quote
        .as_ref()
        .and_then(|q| q.get("05. price"))
        .and_then(|p| p.parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        })
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            intervals: Interval::ALL,
            supports_current_price: true,
            requires_credential: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(5)
    }

    async fn fetch_quotes(
        &self,
        context: &RequestContext<'_>,
        interval: Interval,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let api_key = http::require_credential(PROVIDER_ID, context.credential)?;

        let mut params = series_params(interval);
        params.push(("symbol", context.symbol));

        let text = self.fetch(api_key, &params).await?;
        let bars = parse_time_series(&text)?;

        debug!(
            "Alpha Vantage: fetched {} {} bars for {}",
            bars.len(),
            interval,
            context.symbol
        );

        Ok(bars)
    }

    async fn fetch_current_price(
        &self,
        context: &RequestContext<'_>,
    ) -> Result<f64, MarketDataError> {
        let api_key = http::require_credential(PROVIDER_ID, context.credential)?;
        let params = [("function", "GLOBAL_QUOTE"), ("symbol", context.symbol)];
        let text = self.fetch(api_key, &params).await?;
        parse_global_quote(&text)
    }
}
