//! Quote fetcher orchestrating market data and news providers.
//!
//! The fetcher owns the provider lists, the call ledger and the credential
//! store. It handles:
//! - Ordered fallback for bars and current prices (first non-empty result wins)
//! - Union of news providers with de-duplication
//! - Rate limiting per provider
//! - Bar validation and normalization

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info, warn};

use super::{BarValidator, FetchDiagnostics, RateLimiter, SkipReason};
use crate::config::{order_by_preference, FetcherConfig};
use crate::credentials::{CredentialPersistence, CredentialStore};
use crate::errors::{ErrorClass, MarketDataError};
use crate::models::{
    normalize_bars, Bar, Interval, NewsArticle, ProviderId, ProviderStatus, QuoteResponse,
    RequestContext,
};
use crate::provider::alpha_vantage::AlphaVantageProvider;
use crate::provider::finnhub::FinnhubProvider;
use crate::provider::newsapi::NewsApiProvider;
use crate::provider::twelve_data::TwelveDataProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::{MarketDataProvider, NewsProvider, RateLimit};

/// Classified result of one provider call.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// Usable data.
    Data(T),
    /// The provider answered but nothing usable was left.
    Empty,
    /// The call failed.
    Failed(MarketDataError),
}

/// Multi-provider market data fetcher.
///
/// Built once at startup and shared (e.g. behind an `Arc`) with whatever
/// serves requests. All methods take `&self`.
pub struct QuoteFetcher {
    quote_providers: Vec<Arc<dyn MarketDataProvider>>,
    price_providers: Vec<Arc<dyn MarketDataProvider>>,
    news_providers: Vec<Arc<dyn NewsProvider>>,
    credentials: CredentialStore,
    rate_limiter: RateLimiter,
    validator: BarValidator,
    max_bars: usize,
}

impl QuoteFetcher {
    /// Create a fetcher with the built-in providers, loading keys from
    /// `persistence`.
    pub fn new(
        config: FetcherConfig,
        persistence: Box<dyn CredentialPersistence>,
    ) -> Result<Self, MarketDataError> {
        let credentials = CredentialStore::load(persistence)?;
        let timeout = config.request_timeout();

        let finnhub = Arc::new(FinnhubProvider::with_timeout(timeout));

        let market: Vec<Arc<dyn MarketDataProvider>> = vec![
            Arc::new(YahooProvider::with_timeout(timeout)?),
            finnhub.clone(),
            Arc::new(TwelveDataProvider::with_timeout(timeout)),
            Arc::new(AlphaVantageProvider::with_timeout(timeout)),
        ];
        let news: Vec<Arc<dyn NewsProvider>> = vec![
            finnhub,
            Arc::new(NewsApiProvider::with_timeout(timeout)),
        ];

        Ok(Self::with_providers(config, credentials, market, news))
    }

    /// Create a fetcher with custom providers.
    ///
    /// Provider lists are in registration order; the configured preference
    /// orders are applied on top.
    pub fn with_providers(
        config: FetcherConfig,
        credentials: CredentialStore,
        market: Vec<Arc<dyn MarketDataProvider>>,
        news: Vec<Arc<dyn NewsProvider>>,
    ) -> Self {
        let rate_limiter = RateLimiter::new();

        let limits = market
            .iter()
            .map(|p| (p.id(), p.rate_limit()))
            .chain(news.iter().map(|p| (p.id(), p.rate_limit())));
        for (id, default_limit) in limits {
            let limit = config
                .rate_limit_for(id)
                .map(RateLimit::per_minute)
                .unwrap_or(default_limit);
            rate_limiter.configure(id, limit);
        }

        let quote_providers = order_by_preference(&market, &config.quote_providers, |p| p.id());
        let price_providers = order_by_preference(&market, &config.price_providers, |p| p.id());
        let news_providers = order_by_preference(&news, &config.news_providers, |p| p.id());

        info!(
            "Quote fetcher ready: quotes [{}], prices [{}], news [{}]",
            join_ids(quote_providers.iter().map(|p| p.id())),
            join_ids(price_providers.iter().map(|p| p.id())),
            join_ids(news_providers.iter().map(|p| p.id())),
        );

        Self {
            quote_providers,
            price_providers,
            news_providers,
            credentials,
            rate_limiter,
            validator: BarValidator::new(),
            max_bars: config.bar_cap(),
        }
    }

    /// Bars for `symbol` from the first provider that returns any.
    ///
    /// Returns `None` when every provider was skipped, failed or came back
    /// empty.
    pub async fn get_market_data(&self, symbol: &str, interval: Interval) -> Option<QuoteResponse> {
        self.get_market_data_with_diagnostics(symbol, interval)
            .await
            .0
    }

    /// Like [`get_market_data`](Self::get_market_data), also reporting what
    /// happened with each provider.
    pub async fn get_market_data_with_diagnostics(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> (Option<QuoteResponse>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();
        let symbol = symbol.trim();
        if symbol.is_empty() {
            warn!("Market data requested for an empty symbol");
            return (None, diagnostics);
        }

        for provider in &self.quote_providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            let capabilities = provider.capabilities();

            if !capabilities.supports_interval(interval) {
                debug!("Provider '{}' does not serve {}, skipping", provider_id, interval);
                diagnostics.record_skip(provider_id, SkipReason::UnsupportedInterval);
                continue;
            }

            let credential = self.credentials.get(&provider_id);
            if let Some(reason) =
                self.pre_call_skip(&provider_id, capabilities.requires_credential, &credential)
            {
                diagnostics.record_skip(provider_id, reason);
                continue;
            }

            debug!("Fetching {} bars for {} from '{}'", interval, symbol, provider_id);
            let context = RequestContext::new(symbol, credential.as_deref());
            let result = provider.fetch_quotes(&context, interval).await;

            match self.classify_bars(&provider_id, result) {
                FetchOutcome::Data(bars) => {
                    self.rate_limiter.record_call(&provider_id);
                    info!(
                        "Fetched {} {} bars for {} from '{}'",
                        bars.len(),
                        interval,
                        symbol,
                        provider_id
                    );
                    diagnostics.record_success(provider_id.clone());
                    let response = QuoteResponse {
                        symbol: symbol.to_string(),
                        interval,
                        source: provider_id,
                        bars,
                    };
                    return (Some(response), diagnostics);
                }
                outcome => record_failure(&mut diagnostics, provider_id, outcome),
            }
        }

        warn!(
            "No market data for {} ({}): {}",
            symbol,
            interval,
            diagnostics.summary()
        );
        (None, diagnostics)
    }

    /// Latest traded price for `symbol` from the first provider that has one.
    pub async fn get_current_price(&self, symbol: &str) -> Option<f64> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return None;
        }

        let mut diagnostics = FetchDiagnostics::new();

        for provider in &self.price_providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            let capabilities = provider.capabilities();

            if !capabilities.supports_current_price {
                diagnostics.record_skip(provider_id, SkipReason::NotSupported);
                continue;
            }

            let credential = self.credentials.get(&provider_id);
            if let Some(reason) =
                self.pre_call_skip(&provider_id, capabilities.requires_credential, &credential)
            {
                diagnostics.record_skip(provider_id, reason);
                continue;
            }

            let context = RequestContext::new(symbol, credential.as_deref());
            let outcome = match provider.fetch_current_price(&context).await {
                Ok(price) if price.is_finite() && price > 0.0 => FetchOutcome::Data(price),
                Ok(price) => {
                    debug!("Provider '{}' returned unusable price {}", provider_id, price);
                    FetchOutcome::Empty
                }
                Err(e) => classify_error(e),
            };

            match outcome {
                FetchOutcome::Data(price) => {
                    self.rate_limiter.record_call(&provider_id);
                    debug!("Current price of {} from '{}': {}", symbol, provider_id, price);
                    return Some(price);
                }
                outcome => {
                    log_failure(&provider_id, &outcome);
                    record_failure(&mut diagnostics, provider_id, outcome);
                }
            }
        }

        warn!("No current price for {}: {}", symbol, diagnostics.summary());
        None
    }

    /// Recent articles about `symbol` from every eligible news provider.
    ///
    /// Results are merged, de-duplicated by canonical URL (the first provider
    /// in preference order wins), sorted newest first and truncated to
    /// `limit`.
    pub async fn get_news(&self, symbol: &str, limit: usize) -> Vec<NewsArticle> {
        let symbol = symbol.trim();
        if limit == 0 || symbol.is_empty() {
            return Vec::new();
        }

        let mut collected: Vec<NewsArticle> = Vec::new();
        let mut diagnostics = FetchDiagnostics::new();

        for provider in &self.news_providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            let credential = self.credentials.get(&provider_id);

            if let Some(reason) =
                self.pre_call_skip(&provider_id, provider.requires_credential(), &credential)
            {
                diagnostics.record_skip(provider_id, reason);
                continue;
            }

            let context = RequestContext::new(symbol, credential.as_deref());
            match provider.fetch_news(&context, limit).await {
                Ok(articles) => {
                    // The request succeeded even when it found nothing
                    self.rate_limiter.record_call(&provider_id);
                    debug!(
                        "Provider '{}' returned {} articles for {}",
                        provider_id,
                        articles.len(),
                        symbol
                    );
                    if articles.is_empty() {
                        diagnostics.record_empty(provider_id);
                    } else {
                        diagnostics.record_success(provider_id);
                        collected.extend(articles);
                    }
                }
                Err(e) => {
                    let outcome: FetchOutcome<Vec<NewsArticle>> = classify_error(e);
                    log_failure(&provider_id, &outcome);
                    record_failure(&mut diagnostics, provider_id, outcome);
                }
            }
        }

        let articles = merge_articles(collected, limit);
        debug!(
            "News for {}: {} articles ({})",
            symbol,
            articles.len(),
            diagnostics.summary()
        );
        articles
    }

    /// Per-provider status snapshot, keyed by provider id.
    ///
    /// Reading the status never changes the call ledger.
    pub fn get_api_status(&self) -> BTreeMap<String, ProviderStatus> {
        let mut requires: BTreeMap<String, bool> = BTreeMap::new();

        for provider in &self.quote_providers {
            *requires.entry(provider.id().to_string()).or_default() |=
                provider.capabilities().requires_credential;
        }
        for provider in &self.news_providers {
            *requires.entry(provider.id().to_string()).or_default() |=
                provider.requires_credential();
        }

        requires
            .into_iter()
            .map(|(id, requires_key)| {
                let status = ProviderStatus {
                    has_key: self.credentials.has(&id),
                    requires_key,
                    remaining_calls: self.rate_limiter.remaining(&id),
                    limit: self.rate_limiter.limit(&id),
                };
                (id, status)
            })
            .collect()
    }

    /// Store new API keys.
    ///
    /// Provider names are case-insensitive. Blank values are ignored and never
    /// overwrite a stored key. Keys take effect on the next request. Returns
    /// the number of keys applied.
    pub fn update_api_keys(&self, keys: HashMap<String, String>) -> Result<usize, MarketDataError> {
        let applied = self.credentials.update(keys)?;
        info!("Applied {} API key update(s)", applied);
        Ok(applied)
    }

    /// Skip reason that applies before any call is made.
    fn pre_call_skip(
        &self,
        provider_id: &str,
        requires_credential: bool,
        credential: &Option<String>,
    ) -> Option<SkipReason> {
        if requires_credential && credential.is_none() {
            debug!("Provider '{}' has no API key, skipping", provider_id);
            return Some(SkipReason::MissingCredential);
        }

        if !self.rate_limiter.may_call(provider_id) {
            info!("Provider '{}' is rate limited, skipping", provider_id);
            return Some(SkipReason::RateLimited);
        }

        None
    }

    /// Validate and normalize adapter output.
    fn classify_bars(
        &self,
        provider_id: &str,
        result: Result<Vec<Bar>, MarketDataError>,
    ) -> FetchOutcome<Vec<Bar>> {
        let outcome = match result {
            Ok(bars) => {
                let original_count = bars.len();
                let (valid, invalid) = self.validator.validate_batch(bars);

                if !invalid.is_empty() {
                    warn!(
                        "Dropped {} of {} bars from '{}' that failed validation",
                        invalid.len(),
                        original_count,
                        provider_id
                    );
                }

                let bars = normalize_bars(valid, self.max_bars);
                if bars.is_empty() {
                    FetchOutcome::Empty
                } else {
                    FetchOutcome::Data(bars)
                }
            }
            Err(e) => classify_error(e),
        };

        log_failure(provider_id, &outcome);
        outcome
    }
}

/// `NoData` is an empty answer, everything else a failure.
fn classify_error<T>(error: MarketDataError) -> FetchOutcome<T> {
    match error {
        MarketDataError::NoData { .. } => FetchOutcome::Empty,
        e => FetchOutcome::Failed(e),
    }
}

fn log_failure<T>(provider_id: &str, outcome: &FetchOutcome<T>) {
    match outcome {
        FetchOutcome::Data(_) => {}
        FetchOutcome::Empty => info!("Provider '{}' returned no data, trying next", provider_id),
        FetchOutcome::Failed(e) => match e.class() {
            ErrorClass::Configuration => {
                debug!("Provider '{}' skipped: {}", provider_id, e)
            }
            ErrorClass::RateLimit => {
                info!("Provider '{}' rate limited the request: {}", provider_id, e)
            }
            ErrorClass::Transient | ErrorClass::Storage => {
                warn!("Provider '{}' failed: {}, trying next", provider_id, e)
            }
        },
    }
}

fn record_failure<T>(
    diagnostics: &mut FetchDiagnostics,
    provider_id: ProviderId,
    outcome: FetchOutcome<T>,
) {
    match outcome {
        FetchOutcome::Data(_) => diagnostics.record_success(provider_id),
        FetchOutcome::Empty => diagnostics.record_empty(provider_id),
        FetchOutcome::Failed(MarketDataError::MissingCredential { .. }) => {
            diagnostics.record_skip(provider_id, SkipReason::MissingCredential)
        }
        FetchOutcome::Failed(MarketDataError::UnsupportedInterval { .. }) => {
            diagnostics.record_skip(provider_id, SkipReason::UnsupportedInterval)
        }
        FetchOutcome::Failed(MarketDataError::NotSupported { .. }) => {
            diagnostics.record_skip(provider_id, SkipReason::NotSupported)
        }
        FetchOutcome::Failed(e) => diagnostics.record_error(provider_id, e.to_string()),
    }
}

/// De-duplicate by canonical URL, sort newest first and keep `limit`.
///
/// Articles whose URL cannot be canonicalized are dropped.
fn merge_articles(articles: Vec<NewsArticle>, limit: usize) -> Vec<NewsArticle> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<NewsArticle> = articles
        .into_iter()
        .filter(|article| match article.canonical_url() {
            Some(key) => seen.insert(key),
            None => {
                debug!("Dropping article with unusable URL: {}", article.url);
                false
            }
        })
        .collect();

    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged.truncate(limit);
    merged
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.collect::<Vec<_>>().join(", ")
}
