//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Candles via /stock/candle (resolutions 1, 30 and D)
//! - Current price via /quote
//! - Company news via /company-news
//!
//! Finnhub free tier is limited to 60 API calls per minute, shared by
//! quotes and news.
//! API documentation: https://finnhub.io/docs/api

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Bar, Interval, NewsArticle, RequestContext};
use crate::provider::http::{self, DEFAULT_TIMEOUT};
use crate::provider::{MarketDataProvider, NewsProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";

/// How far back /company-news looks.
const NEWS_WINDOW_DAYS: i64 = 7;

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    // Note: o, h, l, d, dp, pc and t exist but are not used
}

/// Response from /stock/candle endpoint
///
/// Array entries may be `null` for gaps in the series.
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: String,
    #[serde(default)]
    c: Vec<Option<f64>>,
    #[serde(default)]
    h: Vec<Option<f64>>,
    #[serde(default)]
    l: Vec<Option<f64>>,
    #[serde(default)]
    o: Vec<Option<f64>>,
    #[serde(default)]
    v: Vec<Option<f64>>,
    /// Timestamps (Unix)
    #[serde(default)]
    t: Vec<Option<i64>>,
}

/// Item of the /company-news array
#[derive(Debug, Deserialize)]
struct NewsItem {
    /// Publication time (Unix)
    datetime: Option<i64>,
    headline: Option<String>,
    summary: Option<String>,
    source: Option<String>,
    url: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data and news provider.
///
/// The API key travels in the `X-Finnhub-Token` header and is taken from the
/// request context on every call.
pub struct FinnhubProvider {
    client: Client,
}

impl FinnhubProvider {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
        }
    }

    /// Make a GET request to the Finnhub API.
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
            .header("X-Finnhub-Token", api_key)
            .query(params);

        debug!("Finnhub request: {} with {} params", endpoint, params.len());

        // Finnhub answers 403 once the key's quota is spent
        let text = http::send(PROVIDER_ID, request, &[StatusCode::FORBIDDEN]).await?;
        check_api_error(&text)?;
        Ok(text)
    }
}

impl Default for FinnhubProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Candle resolution for an interval.
fn resolution(interval: Interval) -> &'static str {
    match interval {
        Interval::OneMinute => "1",
        Interval::ThirtyMinutes => "30",
        Interval::OneDay => "D",
    }
}

/// Finnhub reports some failures as `{"error": "..."}` with a 200 status.
fn check_api_error(text: &str) -> Result<(), MarketDataError> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Ok(()),
    };

    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        if message.to_lowercase().contains("limit") {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        return Err(MarketDataError::provider_error(PROVIDER_ID, message));
    }
    Ok(())
}

/// Parse a /stock/candle body.
///
/// Arrays of unequal length are walked up to the shortest one; volume is
/// optional per bar.
fn parse_candles(text: &str) -> Result<Vec<Bar>, MarketDataError> {
    let response: CandleResponse = http::parse_json(PROVIDER_ID, text)?;

    match response.s.as_str() {
        "ok" => {}
        "no_data" => {
            return Err(MarketDataError::NoData {
                provider: PROVIDER_ID.to_string(),
            })
        }
        other => {
            return Err(MarketDataError::provider_error(
                PROVIDER_ID,
                format!("Unexpected candle status: {}", other),
            ))
        }
    }

    let len = [
        response.t.len(),
        response.o.len(),
        response.h.len(),
        response.l.len(),
        response.c.len(),
    ]
    .into_iter()
    .min()
    .unwrap_or(0);

    if len != response.t.len() {
        warn!(
            "Finnhub: mismatched candle arrays, using {} of {} timestamps",
            len,
            response.t.len()
        );
    }

    let bars: Vec<Bar> = (0..len)
        .filter_map(|i| {
            let volume = response
                .v
                .get(i)
                .copied()
                .flatten()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
                .unwrap_or(0);
            Some(Bar::new(
                response.t[i]?,
                response.o[i]?,
                response.h[i]?,
                response.l[i]?,
                response.c[i]?,
                volume,
            ))
        })
        .collect();

    if bars.len() < len {
        warn!("Finnhub: skipped {} incomplete candles of {}", len - bars.len(), len);
    }

    Ok(bars)
}

/// Parse a /quote body into the current price.
fn parse_quote(text: &str) -> Result<f64, MarketDataError> {
    let response: QuoteResponse = http::parse_json(PROVIDER_ID, text)?;

    // Finnhub returns zeros for unknown symbols instead of an error
    match response.c {
        Some(close) if close > 0.0 => Ok(close),
        _ => Err(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        }),
    }
}

/// Parse a /company-news body, keeping at most `limit` articles.
fn parse_company_news(text: &str, limit: usize) -> Result<Vec<NewsArticle>, MarketDataError> {
    let items: Vec<serde_json::Value> = http::parse_json(PROVIDER_ID, text)?;

    let articles = items
        .into_iter()
        .filter_map(|value| {
            let item: NewsItem = serde_json::from_value(value).ok()?;
            let published_at = DateTime::<Utc>::from_timestamp(item.datetime?, 0)?;
            let url = item.url.filter(|u| !u.trim().is_empty())?;
            let title = item.headline.filter(|h| !h.trim().is_empty())?;
            Some(NewsArticle {
                title,
                description: item.summary.filter(|s| !s.trim().is_empty()),
                url,
                published_at,
                source: item.source.unwrap_or_default(),
                provider: Cow::Borrowed(PROVIDER_ID),
            })
        })
        .take(limit)
        .collect();

    Ok(articles)
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
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
        RateLimit::per_minute(60)
    }

    async fn fetch_quotes(
        &self,
        context: &RequestContext<'_>,
        interval: Interval,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let api_key = http::require_credential(PROVIDER_ID, context.credential)?;

        let end = Utc::now();
        let start = end - interval.lookback();
        let from_ts = start.timestamp().to_string();
        let to_ts = end.timestamp().to_string();

        let params = [
            ("symbol", context.symbol),
            ("resolution", resolution(interval)),
            ("from", from_ts.as_str()),
            ("to", to_ts.as_str()),
        ];

        let text = self.fetch(api_key, "/stock/candle", &params).await?;
        let bars = parse_candles(&text)?;

        debug!(
            "Finnhub: fetched {} {} candles for {}",
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
            .fetch(api_key, "/quote", &[("symbol", context.symbol)])
            .await?;
        parse_quote(&text)
    }
}

// ============================================================================
// NewsProvider Implementation
// ============================================================================

#[async_trait]
impl NewsProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(60)
    }

    async fn fetch_news(
        &self,
        context: &RequestContext<'_>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, MarketDataError> {
        let api_key = http::require_credential(PROVIDER_ID, context.credential)?;

        let to = Utc::now().date_naive();
        let from = to - chrono::Duration::days(NEWS_WINDOW_DAYS);
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        let params = [
            ("symbol", context.symbol),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ];

        let text = self.fetch(api_key, "/company-news", &params).await?;
        let articles = parse_company_news(&text, limit)?;

        debug!(
            "Finnhub: fetched {} articles for {}",
            articles.len(),
            context.symbol
        );

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id() {
        let provider = FinnhubProvider::new();
        assert_eq!(MarketDataProvider::id(&provider), "FINNHUB");
        assert_eq!(NewsProvider::id(&provider), "FINNHUB");
    }

    #[test]
    fn test_provider_capabilities() {
        let provider = FinnhubProvider::new();
        let caps = provider.capabilities();
        assert!(caps.requires_credential);
        assert!(caps.supports_current_price);
        assert!(caps.supports_interval(Interval::OneMinute));
        assert!(caps.supports_interval(Interval::OneDay));
    }

    #[test]
    fn test_rate_limit() {
        let provider = FinnhubProvider::new();
        assert_eq!(MarketDataProvider::rate_limit(&provider).requests_per_minute, 60);
        assert_eq!(NewsProvider::rate_limit(&provider).requests_per_minute, 60);
    }

    #[test]
    fn test_resolution_mapping() {
        assert_eq!(resolution(Interval::OneMinute), "1");
        assert_eq!(resolution(Interval::ThirtyMinutes), "30");
        assert_eq!(resolution(Interval::OneDay), "D");
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_request() {
        let provider = FinnhubProvider::new();
        let context = RequestContext::new("AAPL", None);

        let result = provider.fetch_quotes(&context, Interval::OneDay).await;
        assert!(matches!(result, Err(MarketDataError::MissingCredential { .. })));

        let result = provider.fetch_news(&context, 5).await;
        assert!(matches!(result, Err(MarketDataError::MissingCredential { .. })));
    }

    #[test]
    fn test_quote_response_parsing() {
        let json = r#"{
            "c": 150.25,
            "d": 1.50,
            "dp": 1.01,
            "h": 152.00,
            "l": 148.50,
            "o": 149.00,
            "pc": 148.75,
            "t": 1704067200
        }"#;

        assert_eq!(parse_quote(json).unwrap(), 150.25);
    }

    #[test]
    fn test_quote_unknown_symbol() {
        let json = r#"{"c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0}"#;
        assert!(matches!(
            parse_quote(json),
            Err(MarketDataError::NoData { .. })
        ));
    }

    #[test]
    fn test_candle_response_parsing() {
        let json = r#"{
            "s": "ok",
            "c": [150.0, 151.0, 152.0],
            "h": [151.0, 152.0, 153.0],
            "l": [149.0, 150.0, 151.0],
            "o": [149.5, 150.5, 151.5],
            "v": [1000000, 1100000, 1200000],
            "t": [1704067200, 1704153600, 1704240000]
        }"#;

        let bars = parse_candles(json).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0], Bar::new(1704067200, 149.5, 151.0, 149.0, 150.0, 1_000_000));
        assert_eq!(bars[2].close, 152.0);
    }

    #[test]
    fn test_candle_response_no_data() {
        let json = r#"{"s": "no_data"}"#;
        assert!(matches!(
            parse_candles(json),
            Err(MarketDataError::NoData { .. })
        ));
    }

    #[test]
    fn test_candle_mismatched_lengths_truncates() {
        let json = r#"{
            "s": "ok",
            "c": [150.0, 151.0],
            "h": [151.0, 152.0, 153.0],
            "l": [149.0, 150.0, 151.0],
            "o": [149.5, 150.5, 151.5],
            "t": [1704067200, 1704153600, 1704240000]
        }"#;

        let bars = parse_candles(json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].volume, 0);
    }

    #[test]
    fn test_candle_gaps_skip_only_that_bar() {
        let json = r#"{
            "s": "ok",
            "c": [150.0, null, 152.0],
            "h": [151.0, 152.0, 153.0],
            "l": [149.0, 150.0, 151.0],
            "o": [149.5, 150.5, 151.5],
            "v": [1000, 1100, null],
            "t": [1704067200, 1704153600, 1704240000]
        }"#;

        let bars = parse_candles(json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 1704067200);
        assert_eq!(bars[1].timestamp, 1704240000);
        assert_eq!(bars[1].volume, 0);
    }

    #[test]
    fn test_api_error_body() {
        let limit = r#"{"error": "API limit reached. Please try again later."}"#;
        assert!(matches!(
            check_api_error(limit),
            Err(MarketDataError::RateLimited { .. })
        ));

        let denied = r#"{"error": "You don't have access to this resource."}"#;
        assert!(matches!(
            check_api_error(denied),
            Err(MarketDataError::ProviderError { .. })
        ));

        assert!(check_api_error(r#"{"s": "ok"}"#).is_ok());
        assert!(check_api_error("[]").is_ok());
    }

    #[test]
    fn test_company_news_parsing() {
        let json = r#"[
            {
                "category": "company",
                "datetime": 1704067200,
                "headline": "Apple unveils new product",
                "id": 1,
                "image": "",
                "related": "AAPL",
                "source": "Reuters",
                "summary": "Details inside.",
                "url": "https://example.com/a"
            },
            {
                "category": "company",
                "datetime": 1704060000,
                "headline": "No link here",
                "id": 2,
                "source": "Reuters",
                "summary": "",
                "url": ""
            },
            {
                "category": "company",
                "datetime": 1704050000,
                "headline": "Second story",
                "id": 3,
                "source": "Bloomberg",
                "summary": "",
                "url": "https://example.com/b"
            }
        ]"#;

        let articles = parse_company_news(json, 10).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Apple unveils new product");
        assert_eq!(articles[0].description.as_deref(), Some("Details inside."));
        assert_eq!(articles[0].published_at.timestamp(), 1704067200);
        assert_eq!(articles[0].provider, "FINNHUB");
        assert_eq!(articles[1].description, None);

        let articles = parse_company_news(json, 1).unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn test_company_news_skips_malformed_items() {
        let json = r#"[
            {"datetime": "yesterday", "headline": "Bad time", "url": "https://example.com/x"},
            {"datetime": 1704067200, "headline": null, "url": "https://example.com/y"},
            {"datetime": 1704060000, "headline": "Kept", "source": null, "summary": null, "url": "https://example.com/z"}
        ]"#;

        let articles = parse_company_news(json, 10).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Kept");
        assert_eq!(articles[0].source, "");
        assert_eq!(articles[0].description, None);
    }
}
