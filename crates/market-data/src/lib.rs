//! Paper-trading Market Data Crate
//!
//! This crate provides provider-agnostic market data fetching for the
//! paper-trading dashboard: OHLCV bars, current prices and news, pulled from
//! several third-party providers with per-provider rate limits and fallback.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple quote providers: Yahoo Finance, Finnhub, Twelve Data, Alpha Vantage
//! - Multiple news providers: Finnhub, NewsAPI
//! - Sliding-window rate limiting per provider
//! - Runtime API key updates through a pluggable persistence layer
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  Caller (web)    |  get_market_data / get_current_price / get_news
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  QuoteFetcher    | --> | CredentialStore  |  (keys, persisted)
//! +------------------+     +------------------+
//!          |   \
//!          |    +--------> RateLimiter (call ledger, 60 s window)
//!          v
//! +------------------+
//! |    Provider      |  (Yahoo, Finnhub, Twelve Data, Alpha Vantage, NewsAPI)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  QuoteResponse   |  (bars from exactly one provider)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`QuoteFetcher`] - Orchestrates providers
//! - [`QuoteResponse`] / [`Bar`] - Normalized OHLCV history
//! - [`NewsArticle`] - Normalized news item
//! - [`ProviderStatus`] - Key and budget snapshot per provider
//! - [`FetcherConfig`] - Provider orders, limit overrides, timeouts

pub mod config;
pub mod credentials;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use config::FetcherConfig;
pub use credentials::{CredentialPersistence, CredentialStore, InMemoryCredentialPersistence};
pub use errors::{ErrorClass, MarketDataError};

// Re-export all public types from models
pub use models::{
    canonical_url, normalize_provider_id, Bar, Interval, NewsArticle, ProviderId, ProviderStatus,
    QuoteResponse, RequestContext, MAX_BARS,
};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::newsapi::NewsApiProvider;
pub use provider::twelve_data::TwelveDataProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, NewsProvider, ProviderCapabilities, RateLimit};

// Re-export registry types
pub use registry::{
    BarValidator, FetchDiagnostics, FetchOutcome, ProviderAttempt, QuoteFetcher, RateLimiter,
    SkipReason,
};
