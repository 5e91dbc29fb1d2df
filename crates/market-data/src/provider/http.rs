//! Shared HTTP plumbing for the REST-based providers.

use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::errors::MarketDataError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used by a provider.
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a request and return the body text.
///
/// Maps transport failures and non-2xx statuses to `MarketDataError`:
/// timeouts to `Timeout`, 429 and any of `quota_statuses` to `RateLimited`,
/// everything else to `ProviderError` carrying the status.
pub(crate) async fn send(
    provider: &str,
    request: RequestBuilder,
    quota_statuses: &[StatusCode],
) -> Result<String, MarketDataError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            MarketDataError::provider_error(provider, format!("Request failed: {}", e))
        }
    })?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS || quota_statuses.contains(&status) {
        return Err(MarketDataError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(MarketDataError::provider_error(
            provider,
            "Invalid or missing API key",
        ));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!("{} returned HTTP {}: {}", provider, status, truncate(&body, 200));
        return Err(MarketDataError::provider_error(
            provider,
            format!("HTTP {}", status),
        ));
    }

    response.text().await.map_err(|e| {
        MarketDataError::provider_error(provider, format!("Failed to read response: {}", e))
    })
}

/// Parse a JSON body, mapping failures to a provider error.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    text: &str,
) -> Result<T, MarketDataError> {
    serde_json::from_str(text).map_err(|e| {
        MarketDataError::provider_error(provider, format!("Failed to parse response: {}", e))
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Return the credential or fail before touching the network.
pub(crate) fn require_credential<'a>(
    provider: &str,
    credential: Option<&'a str>,
) -> Result<&'a str, MarketDataError> {
    match credential {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(MarketDataError::MissingCredential {
            provider: provider.to_string(),
        }),
    }
}
