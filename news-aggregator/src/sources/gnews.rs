use crate::fetcher::Fetcher;
use crate::parser;
use crate::traits::NewsProvider;
use crate::types::{Category, RawArticle, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

pub const GNEWS_BASE_URL: &str = "https://gnews.io";

/// GNews `api/v4/top-headlines` client
pub struct GNewsSource {
    fetcher: Arc<Fetcher>,
    base_url: Url,
    api_key: Option<String>,
    lang: String,
    country: String,
}

impl GNewsSource {
    pub fn new(fetcher: Arc<Fetcher>, base_url: Url, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            lang: "en".to_string(),
            country: "us".to_string(),
        }
    }

    pub fn with_locale(mut self, lang: impl Into<String>, country: impl Into<String>) -> Self {
        self.lang = lang.into();
        self.country = country.into();
        self
    }

    pub fn provider_category(category: Category) -> &'static str {
        match category {
            Category::World => "world",
            Category::Politics => "nation",
            Category::Business | Category::Finance => "business",
            Category::Technology | Category::Gaming => "technology",
            Category::Entertainment => "entertainment",
            Category::Sports => "sports",
            Category::Science | Category::Environment => "science",
            Category::Health => "health",
            _ => "general",
        }
    }

    fn headlines_url(&self, api_key: &str, category: Category, page_size: u32) -> Result<Url> {
        let mut url = self.base_url.join("api/v4/top-headlines")?;
        url.query_pairs_mut()
            .append_pair("category", Self::provider_category(category))
            .append_pair("lang", &self.lang)
            .append_pair("country", &self.country)
            .append_pair("max", &page_size.to_string())
            .append_pair("apikey", api_key);
        Ok(url)
    }
}

#[async_trait]
impl NewsProvider for GNewsSource {
    fn provider_id(&self) -> &str {
        "gnews"
    }

    fn provider_name(&self) -> String {
        format!("GNews ({})", self.base_url.host_str().unwrap_or("gnews.io"))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn top_headlines(&self, category: Category, page_size: u32) -> Result<Vec<RawArticle>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("GNews API key not configured, skipping {}", category);
            return Ok(Vec::new());
        };

        info!("Fetching GNews headlines for {}", category);
        let url = self.headlines_url(api_key, category, page_size)?;
        let body = self.fetcher.fetch_text(self.provider_id(), &url).await?;
        parser::parse_gnews(self.provider_id(), &body)
    }
}
