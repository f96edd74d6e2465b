use crate::types::{Category, RawArticle, Result};
use async_trait::async_trait;

/// Trait for pulling top headlines from an external news provider
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Short stable identifier; also prefixes the ids of articles it supplies
    fn provider_id(&self) -> &str;

    /// Human-readable name for this provider
    fn provider_name(&self) -> String;

    /// Whether the provider has what it needs (an API key, usually) to be called
    fn is_configured(&self) -> bool {
        true
    }

    /// Fetch the current top headlines for one category
    async fn top_headlines(&self, category: Category, page_size: u32) -> Result<Vec<RawArticle>>;
}
