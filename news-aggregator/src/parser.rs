use crate::types::{AggregatorError, RawArticle, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct SourceRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    source: Option<SourceRef>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GNewsResponse {
    #[serde(default)]
    articles: Vec<GNewsArticle>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GNewsArticle {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    image: Option<String>,
    published_at: Option<String>,
    source: Option<SourceRef>,
}

/// Decode a NewsAPI `top-headlines` body.
pub fn parse_newsapi(provider: &str, body: &str) -> Result<Vec<RawArticle>> {
    debug!("Parsing {} payload ({} bytes)", provider, body.len());

    let response: NewsApiResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        return Err(AggregatorError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: response.message.unwrap_or_else(|| format!("status {}", response.status)),
        });
    }

    let articles: Vec<RawArticle> = response
        .articles
        .into_iter()
        .map(|a| RawArticle {
            provider: provider.to_string(),
            title: a.title,
            description: a.description,
            content: a.content,
            url: a.url,
            image_url: a.url_to_image,
            source_name: a.source.and_then(|s| s.name),
            author: a.author,
            published_at: a.published_at.as_deref().and_then(parse_timestamp),
        })
        .collect();

    info!("Parsed {} articles from {}", articles.len(), provider);
    Ok(articles)
}

/// Decode a GNews `top-headlines` body.
pub fn parse_gnews(provider: &str, body: &str) -> Result<Vec<RawArticle>> {
    debug!("Parsing {} payload ({} bytes)", provider, body.len());

    let response: GNewsResponse = serde_json::from_str(body)?;
    if let Some(errors) = response.errors {
        return Err(AggregatorError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: errors.to_string(),
        });
    }

    let articles: Vec<RawArticle> = response
        .articles
        .into_iter()
        .map(|a| RawArticle {
            provider: provider.to_string(),
            title: a.title,
            description: a.description,
            content: a.content,
            url: a.url,
            image_url: a.image,
            source_name: a.source.and_then(|s| s.name),
            // GNews does not report authors
            author: None,
            published_at: a.published_at.as_deref().and_then(parse_timestamp),
        })
        .collect();

    info!("Parsed {} articles from {}", articles.len(), provider);
    Ok(articles)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Keep the first article seen for every URL, in first-seen order.
///
/// URLs are compared as exact strings. Articles without a URL are dropped
/// since they can never be stored.
pub fn dedupe_by_url(articles: Vec<RawArticle>) -> Vec<RawArticle> {
    let total = articles.len();
    let mut seen_urls = HashSet::with_capacity(total);
    let mut unique = Vec::with_capacity(total);

    for article in articles {
        let Some(url) = article.url.as_deref() else {
            debug!("Dropping article without URL from {}", article.provider);
            continue;
        };

        if seen_urls.insert(url.to_string()) {
            unique.push(article);
        } else {
            debug!("Removing duplicate article: {}", url);
        }
    }

    let removed_count = total - unique.len();
    if removed_count > 0 {
        info!("Removed {} duplicate articles", removed_count);
    }

    unique
}
