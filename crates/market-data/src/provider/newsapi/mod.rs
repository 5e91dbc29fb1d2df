//! NewsAPI news provider.
//!
//! Searches /v2/everything for the symbol, newest first. Free tier allows
//! 100 requests per day; the local budget is set to 100 per minute.
//! API documentation: https://newsapi.org/docs

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{NewsArticle, RequestContext};
use crate::provider::http::{self, DEFAULT_TIMEOUT};
use crate::provider::{NewsProvider, RateLimit};

const BASE_URL: &str = "https://newsapi.org/v2/everything";
const PROVIDER_ID: &str = "NEWSAPI";

/// NewsAPI caps `pageSize` at 100.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ArticleItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleItem {
    #[serde(default)]
    source: Option<ArticleSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

pub struct NewsApiProvider {
    client: Client,
}

impl NewsApiProvider {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
        }
    }
}

impl Default for NewsApiProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_article(item: ArticleItem) -> Option<NewsArticle> {
    let title = item.title.filter(|t| !t.trim().is_empty())?;
    // Removed articles come back as "[Removed]" with no usable link
    if title == "[Removed]" {
        return None;
    }
    let url = item.url.filter(|u| !u.trim().is_empty())?;
    let published_at = DateTime::parse_from_rfc3339(item.published_at.as_deref()?)
        .ok()?
        .with_timezone(&Utc);

    Some(NewsArticle {
        title,
        description: item.description.filter(|d| !d.trim().is_empty()),
        url,
        published_at,
        source: item.source.and_then(|s| s.name).unwrap_or_default(),
        provider: Cow::Borrowed(PROVIDER_ID),
    })
}

/// Parse a /v2/everything body, keeping at most `limit` articles.
fn parse_everything(text: &str, limit: usize) -> Result<Vec<NewsArticle>, MarketDataError> {
    let response: EverythingResponse = http::parse_json(PROVIDER_ID, text)?;

    if response.status != "ok" {
        return Err(match response.code.as_deref() {
            Some("rateLimited") => MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            },
            _ => MarketDataError::provider_error(
                PROVIDER_ID,
                response
                    .message
                    .unwrap_or_else(|| format!("status {}", response.status)),
            ),
        });
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(parse_article)
        .take(limit)
        .collect())
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(100)
    }

    async fn fetch_news(
        &self,
        context: &RequestContext<'_>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, MarketDataError> {
        let api_key = http::require_credential(PROVIDER_ID, context.credential)?;
        let page_size = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        let request = self
            .client
            .get(BASE_URL)
            .header("X-Api-Key", api_key)
            .query(&[
                ("q", context.symbol),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
            ]);

        debug!("NewsAPI request for {} (pageSize {})", context.symbol, page_size);

        let text = http::send(PROVIDER_ID, request, &[]).await?;
        let articles = parse_everything(&text, limit)?;

        debug!(
            "NewsAPI: fetched {} articles for {}",
            articles.len(),
            context.symbol
        );

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_basics() {
        let provider = NewsApiProvider::new();
        assert_eq!(provider.id(), "NEWSAPI");
        assert!(provider.requires_credential());
        assert_eq!(provider.rate_limit().requests_per_minute, 100);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_request() {
        let provider = NewsApiProvider::new();
        let context = RequestContext::new("AAPL", None);
        assert!(matches!(
            provider.fetch_news(&context, 5).await,
            Err(MarketDataError::MissingCredential { .. })
        ));
    }

    #[test]
    fn test_everything_parsing() {
        let json = r#"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {
                    "source": {"id": "reuters", "name": "Reuters"},
                    "author": "Jane Doe",
                    "title": "Apple shares climb",
                    "description": "Shares rose 2%.",
                    "url": "https://www.reuters.com/apple-climb",
                    "publishedAt": "2024-01-02T15:04:05Z",
                    "content": "..."
                },
                {
                    "source": {"id": null, "name": "[Removed]"},
                    "title": "[Removed]",
                    "description": "[Removed]",
                    "url": "https://removed.com",
                    "publishedAt": "1970-01-01T00:00:00Z"
                },
                {
                    "source": {"id": null, "name": "Blog"},
                    "title": "Bad date",
                    "description": null,
                    "url": "https://blog.example.com/x",
                    "publishedAt": "yesterday"
                }
            ]
        }"#;

        let articles = parse_everything(json, 10).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Apple shares climb");
        assert_eq!(articles[0].source, "Reuters");
        assert_eq!(articles[0].provider, "NEWSAPI");
        assert_eq!(articles[0].published_at.timestamp(), 1704207845);
    }

    #[test]
    fn test_error_body() {
        let json = r#"{"status": "error", "code": "rateLimited", "message": "You have made too many requests."}"#;
        assert!(matches!(
            parse_everything(json, 5),
            Err(MarketDataError::RateLimited { .. })
        ));

        let json = r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid."}"#;
        assert!(matches!(
            parse_everything(json, 5),
            Err(MarketDataError::ProviderError { .. })
        ));
    }
}
