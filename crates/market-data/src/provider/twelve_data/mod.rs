//! Twelve Data market data provider implementation.
//!
//! - Bars via /time_series (1min, 30min, 1day; up to 100 values)
//! - Current price via /price
//!
//! Free tier is limited to 8 API calls per minute. Errors arrive as HTTP 200
//! with `{"status": "error", "code": ..., "message": ...}`.
//! API documentation: https://twelvedata.com/docs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Bar, Interval, RequestContext, MAX_BARS};
use crate::provider::http::{self, DEFAULT_TIMEOUT};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://api.twelvedata.com";
const PROVIDER_ID: &str = "TWELVE_DATA";

// ============================================================================
// API Response Structures
// ============================================================================

/// Error body, sent with HTTP 200
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    status: Option<String>,
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    /// Kept raw so one malformed value only drops itself
    #[serde(default)]
    values: Vec<serde_json::Value>,
}

/// All numeric fields are strings
#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

// ============================================================================
// TwelveDataProvider
// ============================================================================

pub struct TwelveDataProvider {
    client: Client,
}

impl TwelveDataProvider {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
        }
    }

    async fn fetch(
        &self,
        api_key: &str,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, MarketDataError> {
        let url = format!("{}{}", BASE_URL, endpoint);
        let request = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", api_key)]);

        debug!("Twelve Data request: {} with {} params", endpoint, params.len());

        let text = http::send(PROVIDER_ID, request, &[]).await?;
        check_api_error(&text)?;
        Ok(text)
    }
}

impl Default for TwelveDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn interval_param(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1min",
        Interval::ThirtyMinutes => "30min",
        Interval::OneDay => "1day",
    }
}

fn check_api_error(text: &str) -> Result<(), MarketDataError> {
    let Ok(error) = serde_json::from_str::<ErrorResponse>(text) else {
        return Ok(());
    };

    if error.status.as_deref() != Some("error") {
        return Ok(());
    }

    let message = error.message.unwrap_or_else(|| "Unknown error".to_string());
    match error.code {
        Some(429) => Err(MarketDataError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        }),
        Some(400) | Some(404) if message.to_lowercase().contains("symbol") => {
            Err(MarketDataError::NoData {
                provider: PROVIDER_ID.to_string(),
            })
        }
        code => Err(MarketDataError::provider_error(
            PROVIDER_ID,
            match code {
                Some(code) => format!("{} (code {})", message, code),
                None => message,
            },
        )),
    }
}

/// Parse `2024-01-02 15:30:00` (intraday) or `2024-01-02` (daily), both UTC.
fn parse_datetime(raw: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn parse_value(raw: serde_json::Value) -> Option<Bar> {
    let value: TimeSeriesValue = serde_json::from_value(raw).ok()?;
    let timestamp = parse_datetime(&value.datetime)?;
    // Forex and index series carry no volume
    let volume = value
        .volume
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
        .unwrap_or(0);
    Some(Bar::new(
        timestamp,
        value.open.parse().ok()?,
        value.high.parse().ok()?,
        value.low.parse().ok()?,
        value.close.parse().ok()?,
        volume,
    ))
}

/// Parse a /time_series body. Values arrive newest first.
fn parse_time_series(text: &str) -> Result<Vec<Bar>, MarketDataError> {
    let response: TimeSeriesResponse = http::parse_json(PROVIDER_ID, text)?;

    let total = response.values.len();
    let bars: Vec<Bar> = response.values.into_iter().filter_map(parse_value).collect();

    if bars.len() < total {
        warn!(
            "Twelve Data: skipped {} malformed values out of {}",
            total - bars.len(),
            total
        );
    }

    Ok(bars)
}

fn parse_price(text: &str) -> Result<f64, MarketDataError> {
    let response: PriceResponse = http::parse_json(PROVIDER_ID, text)?;
    response
        .price
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| {
            MarketDataError::provider_error(
                PROVIDER_ID,
                format!("Invalid price: {}", response.price),
            )
        })
}

#[async_trait]
impl MarketDataProvider for TwelveDataProvider {
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
        RateLimit::per_minute(8)
    }

    async fn fetch_quotes(
        &self,
        context: &RequestContext<'_>,
        interval: Interval,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let api_key = http::require_credential(PROVIDER_ID, context.credential)?;
        let outputsize = MAX_BARS.to_string();

        let params = [
            ("symbol", context.symbol),
            ("interval", interval_param(interval)),
            ("outputsize", outputsize.as_str()),
            ("timezone", "UTC"),
        ];

        let text = self.fetch(api_key, "/time_series", &params).await?;
        let bars = parse_time_series(&text)?;

        debug!(
            "Twelve Data: fetched {} {} bars for {}",
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
        let text = self
            .fetch(api_key, "/price", &[("symbol", context.symbol)])
            .await?;
        parse_price(&text)
    }
}
