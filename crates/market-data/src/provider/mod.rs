//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` and `NewsProvider` traits
//! - Provider capabilities and rate limiting configuration
//! - Concrete provider implementations (Yahoo, Finnhub, Twelve Data,
//!   Alpha Vantage, NewsAPI)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The fetcher only sees trait objects, never names
//! - **Extensible**: New providers can be added by implementing a trait
//! - **Contained**: Adapters turn every failure into a `MarketDataError`;
//!   nothing a provider does can crash the caller

mod capabilities;
mod http;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod newsapi;
pub mod twelve_data;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use http::DEFAULT_TIMEOUT;
pub use traits::{MarketDataProvider, NewsProvider};
