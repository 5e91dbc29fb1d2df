//! Yahoo Finance market data provider.
//!
//! This provider uses the Yahoo Finance chart API through `yahoo_finance_api`
//! to fetch bars for equities, ETFs, indices (e.g. `^GSPC`) and crypto pairs
//! (e.g. `BTC-USD`). It needs no API key.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{Bar, Interval, RequestContext};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit, DEFAULT_TIMEOUT};

const PROVIDER_ID: &str = "YAHOO";

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a provider whose chart requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                MarketDataError::provider_error(
                    PROVIDER_ID,
                    format!("Failed to initialize Yahoo connector: {}", e),
                )
            })?;
        Ok(Self { connector })
    }
}

/// Chart interval and range for a bar interval.
fn chart_params(interval: Interval) -> (&'static str, &'static str) {
    match interval {
        Interval::OneMinute => ("1m", "1d"),
        Interval::ThirtyMinutes => ("30m", "5d"),
        Interval::OneDay => ("1d", "1y"),
    }
}

fn map_yahoo_error(error: yahoo::YahooError) -> MarketDataError {
    if matches!(
        error,
        yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult
    ) {
        MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        }
    } else {
        MarketDataError::provider_error(PROVIDER_ID, error.to_string())
    }
}

/// Build a bar from chart values, rejecting records Yahoo fills with
/// non-finite placeholders.
fn to_bar(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Option<Bar> {
    if [open, high, low, close].iter().all(|v| v.is_finite()) {
        Some(Bar::new(timestamp, open, high, low, close, volume))
    } else {
        None
    }
}

fn convert_quotes(quotes: Vec<yahoo::Quote>) -> Vec<Bar> {
    let total = quotes.len();
    let bars: Vec<Bar> = quotes
        .into_iter()
        .filter_map(|q| to_bar(q.timestamp as i64, q.open, q.high, q.low, q.close, q.volume))
        .collect();

    if bars.len() < total {
        warn!(
            "Yahoo: skipped {} malformed records out of {}",
            total - bars.len(),
            total
        );
    }
    bars
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            intervals: Interval::ALL,
            supports_current_price: true,
            requires_credential: false,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(2000)
    }

    async fn fetch_quotes(
        &self,
        context: &RequestContext<'_>,
        interval: Interval,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let (yahoo_interval, range) = chart_params(interval);

        debug!(
            "Fetching {} bars for {} over {} from Yahoo",
            yahoo_interval, context.symbol, range
        );

        let response = self
            .connector
            .get_quote_range(context.symbol, yahoo_interval, range)
            .await
            .map_err(map_yahoo_error)?;

        let quotes = response.quotes().map_err(map_yahoo_error)?;
        Ok(convert_quotes(quotes))
    }

    async fn fetch_current_price(
        &self,
        context: &RequestContext<'_>,
    ) -> Result<f64, MarketDataError> {
        // Minute bars first; markets that are closed only answer daily bars
        let mut last_error = None;
        for interval in ["1m", "1d"] {
            let quote = match self
                .connector
                .get_latest_quotes(context.symbol, interval)
                .await
                .and_then(|response| response.last_quote())
            {
                Ok(quote) => quote,
                Err(e) => {
                    debug!(
                        "Yahoo latest {} quote failed for {}: {}",
                        interval, context.symbol, e
                    );
                    last_error = Some(map_yahoo_error(e));
                    continue;
                }
            };

            if quote.close.is_finite() && quote.close > 0.0 {
                return Ok(quote.close);
            }
        }

        Err(last_error.unwrap_or(MarketDataError::NoData {
            provider: PROVIDER_ID.to_string(),
        }))
    }
}
