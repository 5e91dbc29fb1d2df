//! Provider orchestration.
//!
//! This module provides the [`QuoteFetcher`] and the pieces it is built from:
//! - Provider ordering and fallback
//! - Rate limiting per provider
//! - Bar validation
//! - Per-call diagnostics

mod fetcher;
mod rate_limiter;
mod skip_reason;
mod validator;

pub use fetcher::{FetchOutcome, QuoteFetcher};
pub use rate_limiter::{RateLimiter, WINDOW};
pub use skip_reason::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use validator::{BarValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
