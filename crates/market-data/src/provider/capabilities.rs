//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited.

use crate::models::Interval;

/// Describes the capabilities of a market data provider.
///
/// Used by the fetcher to decide whether a provider is worth calling at all
/// before spending any rate-limit budget on it.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Intervals the provider can serve bars for.
    pub intervals: &'static [Interval],

    /// Whether the provider has a cheap current-price endpoint.
    pub supports_current_price: bool,

    /// Whether the provider refuses to work without an API key.
    pub requires_credential: bool,
}

impl ProviderCapabilities {
    pub fn supports_interval(&self, interval: Interval) -> bool {
        self.intervals.contains(&interval)
    }
}

/// Rate limiting configuration for a provider.
///
/// Mirrors the provider's published free-tier quota. Enforcement is local to
/// the process and only approximates what the provider actually counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed in any trailing 60-second window.
    pub requests_per_minute: u32,
}

impl RateLimit {
    pub const fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(60)
    }
}
