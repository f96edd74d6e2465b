use crate::fetcher::Fetcher;
use crate::parser;
use crate::traits::NewsProvider;
use crate::types::{Category, RawArticle, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

pub const NEWSAPI_BASE_URL: &str = "https://newsapi.org";

/// NewsAPI.org `v2/top-headlines` client
pub struct NewsApiSource {
    fetcher: Arc<Fetcher>,
    base_url: Url,
    api_key: Option<String>,
    country: String,
}

impl NewsApiSource {
    pub fn new(fetcher: Arc<Fetcher>, base_url: Url, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            country: "us".to_string(),
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// NewsAPI only knows business, entertainment, general, health,
    /// science, sports and technology.
    pub fn provider_category(category: Category) -> &'static str {
        match category {
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science | Category::Environment => "science",
            Category::Sports => "sports",
            Category::Technology | Category::Gaming => "technology",
            _ => "general",
        }
    }

    fn headlines_url(&self, api_key: &str, category: Category, page_size: u32) -> Result<Url> {
        let mut url = self.base_url.join("v2/top-headlines")?;
        url.query_pairs_mut()
            .append_pair("category", Self::provider_category(category))
            .append_pair("country", &self.country)
            .append_pair("pageSize", &page_size.to_string())
            .append_pair("apiKey", api_key);
        Ok(url)
    }
}

#[async_trait]
impl NewsProvider for NewsApiSource {
    fn provider_id(&self) -> &str {
        "newsapi"
    }

    fn provider_name(&self) -> String {
        format!("NewsAPI ({})", self.base_url.host_str().unwrap_or("newsapi.org"))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn top_headlines(&self, category: Category, page_size: u32) -> Result<Vec<RawArticle>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("NewsAPI key not configured, skipping {}", category);
            return Ok(Vec::new());
        };

        info!("Fetching NewsAPI headlines for {}", category);
        let url = self.headlines_url(api_key, category, page_size)?;
        let body = self.fetcher.fetch_text(self.provider_id(), &url).await?;
        parser::parse_newsapi(self.provider_id(), &body)
    }
}
