//! Error types and failure classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`ErrorClass`]: Classification used by the fetcher to decide how loudly to skip

mod class;

pub use class::ErrorClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Provider-level errors never cross the [`QuoteFetcher`](crate::QuoteFetcher)
/// boundary; they are absorbed and recorded in the fetch diagnostics.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider needs an API key and none is configured.
    #[error("Missing credential for provider: {provider}")]
    MissingCredential {
        /// The provider lacking a credential
        provider: String,
    },

    /// The provider cannot serve the requested interval.
    #[error("Interval {interval} not supported by {provider}")]
    UnsupportedInterval {
        /// The provider that rejected the interval
        provider: String,
        /// The requested interval
        interval: String,
    },

    /// An interval string outside the supported set (`1m`, `30m`, `1D`).
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// The provider rate limited the request (HTTP 429 or an API note),
    /// or the local call ledger has no budget left.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (bad status, malformed payload, API error body).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered but had nothing for the symbol/interval.
    #[error("No data: {provider}")]
    NoData {
        /// The provider that returned no data
        provider: String,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation {operation} not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that does not support it
        provider: String,
    },

    /// Loading or saving credentials failed.
    #[error("Credential persistence failed: {0}")]
    Persistence(String),
}

impl MarketDataError {
    pub(crate) fn provider_error(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Returns the failure class for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use papertrade_market_data::errors::{ErrorClass, MarketDataError};
    ///
    /// let error = MarketDataError::RateLimited { provider: "FINNHUB".to_string() };
    /// assert_eq!(error.class(), ErrorClass::RateLimit);
    ///
    /// let error = MarketDataError::MissingCredential { provider: "FINNHUB".to_string() };
    /// assert_eq!(error.class(), ErrorClass::Configuration);
    /// ```
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingCredential { .. }
            | Self::UnsupportedInterval { .. }
            | Self::InvalidInterval(_)
            | Self::NotSupported { .. } => ErrorClass::Configuration,

            Self::RateLimited { .. } => ErrorClass::RateLimit,

            Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::NoData { .. } => ErrorClass::Transient,

            Self::Persistence(_) => ErrorClass::Storage,
        }
    }
}
