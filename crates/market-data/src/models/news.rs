use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::types::ProviderId;

/// A news article related to a symbol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub url: String,

    pub published_at: DateTime<Utc>,

    /// Publisher name as reported by the provider (e.g. "Reuters")
    pub source: String,

    /// Provider the article was fetched from
    pub provider: ProviderId,
}

impl NewsArticle {
    /// Key used to detect the same article reported by two providers.
    pub fn canonical_url(&self) -> Option<String> {
        canonical_url(&self.url)
    }
}

/// Canonical form of an article URL.
///
/// Scheme, fragment, a leading `www.`, `utm_*` tracking parameters and a
/// trailing slash are ignored; the host is lower-cased. Returns `None` for
/// strings that are not absolute URLs with a host.
pub fn canonical_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let kept: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| !k.to_ascii_lowercase().starts_with("utm_"))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let path = url.path().trim_end_matches('/');

    let mut key = format!("{}{}", host, path);
    if !kept.is_empty() {
        key.push('?');
        key.push_str(&kept.join("&"));
    }
    Some(key)
}
