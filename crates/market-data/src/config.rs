//! Fetcher configuration.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::models::{normalize_provider_id, MAX_BARS};

pub const QUOTE_PROVIDERS_ENV: &str = "PAPERTRADE_QUOTE_PROVIDERS";
pub const PRICE_PROVIDERS_ENV: &str = "PAPERTRADE_PRICE_PROVIDERS";
pub const NEWS_PROVIDERS_ENV: &str = "PAPERTRADE_NEWS_PROVIDERS";
pub const HTTP_TIMEOUT_ENV: &str = "PAPERTRADE_HTTP_TIMEOUT_SECS";
pub const MAX_BARS_ENV: &str = "PAPERTRADE_MAX_BARS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_quote_providers() -> Vec<String> {
    ["YAHOO", "FINNHUB", "TWELVE_DATA", "ALPHA_VANTAGE"]
        .map(String::from)
        .to_vec()
}

fn default_news_providers() -> Vec<String> {
    ["FINNHUB", "NEWSAPI"].map(String::from).to_vec()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_bars() -> usize {
    MAX_BARS
}

/// Provider preference orders and limits used by
/// [`QuoteFetcher`](crate::QuoteFetcher).
///
/// Providers missing from an order list are tried after the listed ones, in
/// registration order.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    #[serde(default = "default_quote_providers")]
    pub quote_providers: Vec<String>,

    #[serde(default = "default_quote_providers")]
    pub price_providers: Vec<String>,

    #[serde(default = "default_news_providers")]
    pub news_providers: Vec<String>,

    /// Calls-per-minute overrides, keyed by provider id
    #[serde(default)]
    pub rate_limits: HashMap<String, u32>,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_bars")]
    pub max_bars: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            quote_providers: default_quote_providers(),
            price_providers: default_quote_providers(),
            news_providers: default_news_providers(),
            rate_limits: HashMap::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_bars: MAX_BARS,
        }
    }
}

impl FetcherConfig {
    /// Defaults overridden by `PAPERTRADE_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(list) = lookup(QUOTE_PROVIDERS_ENV).and_then(|v| parse_list(&v)) {
            config.quote_providers = list;
        }
        if let Some(list) = lookup(PRICE_PROVIDERS_ENV).and_then(|v| parse_list(&v)) {
            config.price_providers = list;
        }
        if let Some(list) = lookup(NEWS_PROVIDERS_ENV).and_then(|v| parse_list(&v)) {
            config.news_providers = list;
        }
        if let Some(secs) = lookup(HTTP_TIMEOUT_ENV).and_then(|v| parse_positive(HTTP_TIMEOUT_ENV, &v)) {
            config.request_timeout_secs = secs as u64;
        }
        if let Some(max) = lookup(MAX_BARS_ENV).and_then(|v| parse_positive(MAX_BARS_ENV, &v)) {
            if max <= MAX_BARS {
                config.max_bars = max;
            } else {
                warn!(
                    "Ignoring {}={}: responses hold at most {} bars",
                    MAX_BARS_ENV, max, MAX_BARS
                );
            }
        }

        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Bars kept per response, within `1..=MAX_BARS`.
    pub fn bar_cap(&self) -> usize {
        self.max_bars.clamp(1, MAX_BARS)
    }

    /// Configured limit override for a provider.
    pub fn rate_limit_for(&self, provider: &str) -> Option<u32> {
        let provider = normalize_provider_id(provider);
        self.rate_limits
            .iter()
            .find(|(k, _)| normalize_provider_id(k) == provider)
            .map(|(_, v)| *v)
    }
}

fn parse_list(raw: &str) -> Option<Vec<String>> {
    let list: Vec<String> = raw
        .split(',')
        .map(normalize_provider_id)
        .filter(|s| !s.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

fn parse_positive(name: &str, raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!("Ignoring invalid value for {}: '{}'", name, raw);
            None
        }
    }
}

/// Order `items` by `preference`; unlisted items follow in their original order.
pub(crate) fn order_by_preference<T>(
    items: &[T],
    preference: &[String],
    id: impl Fn(&T) -> &str,
) -> Vec<T>
where
    T: Clone,
{
    let rank = |item: &T| {
        let item_id = normalize_provider_id(id(item));
        preference
            .iter()
            .position(|p| normalize_provider_id(p) == item_id)
            .unwrap_or(preference.len())
    };

    let mut ordered: Vec<T> = items.to_vec();
    // Stable sort keeps registration order among unlisted providers
    ordered.sort_by_key(|item| rank(item));
    ordered
}
