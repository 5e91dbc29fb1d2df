//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Provider identifier alias and name normalization
//! - `interval` - The closed set of bar intervals (`1m`, `30m`, `1D`)
//! - `quote` - Bars, quote responses and the per-request context
//! - `news` - News articles and URL canonicalization
//! - `status` - Per-provider status snapshot

mod interval;
mod news;
mod quote;
mod status;
mod types;

pub use interval::Interval;
pub use news::{canonical_url, NewsArticle};
pub use quote::{normalize_bars, Bar, QuoteResponse, RequestContext, MAX_BARS};
pub use status::ProviderStatus;
pub use types::{normalize_provider_id, ProviderId};
