//! Provider trait definitions.
//!
//! This module defines the `MarketDataProvider` trait that every quote source
//! implements and the `NewsProvider` trait for article sources.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Bar, Interval, NewsArticle, RequestContext};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new quote source. The fetcher
/// uses the provider's capabilities and rate limit to decide when to call it;
/// the call order itself comes from configuration.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use papertrade_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             intervals: Interval::ALL,
///             supports_current_price: false,
///             requires_credential: false,
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::per_minute(30)
///     }
///
///     // ... implement fetch_quotes
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant upper-case string like "YAHOO" or "FINNHUB".
    /// Used as ledger key, credential key and in logs.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Calls-per-minute budget for this provider.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch bars for `context.symbol` at the given interval.
    ///
    /// Implementations must:
    /// - fail with `UnsupportedInterval` before any network call when the
    ///   interval is not served,
    /// - fail with `MissingCredential` before any network call when a key is
    ///   required and `context.credential` is `None`,
    /// - skip individual malformed records instead of failing the response.
    ///
    /// Bars may be returned in any order; the fetcher normalizes them.
    async fn fetch_quotes(
        &self,
        context: &RequestContext<'_>,
        interval: Interval,
    ) -> Result<Vec<Bar>, MarketDataError>;

    /// Fetch the most recent traded price.
    ///
    /// Default implementation returns `NotSupported`.
    async fn fetch_current_price(
        &self,
        context: &RequestContext<'_>,
    ) -> Result<f64, MarketDataError> {
        let _ = context;
        Err(MarketDataError::NotSupported {
            operation: "current_price".to_string(),
            provider: self.id().to_string(),
        })
    }
}

/// Trait for news providers.
///
/// Unlike quote providers, every eligible news provider is queried and the
/// results are merged.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Unique identifier, shared with the quote provider of the same vendor.
    fn id(&self) -> &'static str;

    /// Whether the provider refuses to work without an API key.
    fn requires_credential(&self) -> bool {
        true
    }

    /// Calls-per-minute budget for this provider.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch up to `limit` recent articles about `context.symbol`.
    async fn fetch_news(
        &self,
        context: &RequestContext<'_>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, MarketDataError>;
}
