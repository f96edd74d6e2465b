//! Persistence for articles and per-user news data.
//!
//! Two interchangeable backends implement the same traits: [`MemoryStore`],
//! an in-process key-value range store, and [`PgStore`], a PostgreSQL
//! adapter. Everything above this module talks to `dyn NewsStore`.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::types::{
    ActivityAction, ActivityEvent, AggregatorError, Article, Bookmark, Category, CategoryInfo, EnrichedArticle, Mood,
    Result, UserPreference,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long an article lives after it was ingested
    pub article_ttl: Duration,
    /// How long activity events are kept
    pub activity_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            article_ttl: Duration::days(10),
            activity_ttl: Duration::days(90),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    /// An article with the same URL (or id) was already stored; nothing changed
    Duplicate,
}

/// Position of the last article on a page. Serialized opaquely for callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub published_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn after(article: &Article) -> Self {
        Self {
            published_at: article.published_at,
            id: article.id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}:{}",
            self.published_at.timestamp(),
            self.published_at.timestamp_subsec_nanos(),
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AggregatorError::InvalidCursor)?;
        let raw = String::from_utf8(bytes).map_err(|_| AggregatorError::InvalidCursor)?;

        let mut parts = raw.splitn(3, ':');
        let (Some(secs), Some(nanos), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AggregatorError::InvalidCursor);
        };
        let secs: i64 = secs.parse().map_err(|_| AggregatorError::InvalidCursor)?;
        let nanos: u32 = nanos.parse().map_err(|_| AggregatorError::InvalidCursor)?;
        let published_at = DateTime::from_timestamp(secs, nanos).ok_or(AggregatorError::InvalidCursor)?;

        Ok(Self {
            published_at,
            id: id.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    /// Present when more articles follow the last one on this page
    pub next_cursor: Option<String>,
}

impl ArticlePage {
    /// Build a page from up to `limit + 1` newest-first articles.
    pub(crate) fn from_overfetch(mut articles: Vec<Article>, limit: usize) -> Self {
        let has_more = articles.len() > limit;
        articles.truncate(limit);
        let next_cursor = match articles.last() {
            Some(last) if has_more => Some(Cursor::after(last).encode()),
            _ => None,
        };
        Self { articles, next_cursor }
    }
}

/// Offset-paginated feed query.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Empty means every category
    pub categories: Vec<Category>,
    pub source: Option<String>,
    pub published_after: Option<DateTime<Utc>>,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        (self.categories.is_empty() || self.categories.contains(&article.category))
            && self.source.as_deref().map_or(true, |s| article.source == s)
            && self.published_after.map_or(true, |after| article.published_at >= after)
    }
}

/// Newest first; ties broken by id so the order is total.
pub(crate) fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Store an article unless one with the same URL exists.
    async fn put(&self, article: EnrichedArticle) -> Result<PutOutcome>;

    async fn get(&self, id: &str) -> Result<Option<Article>>;

    /// Live articles of one category, newest first, resuming after `cursor`.
    async fn query_by_category(&self, category: Category, limit: usize, cursor: Option<&str>) -> Result<ArticlePage>;

    /// Live articles carrying `mood_tag`, newest first.
    async fn query_by_mood(&self, mood_tag: &str, limit: usize) -> Result<Vec<Article>>;

    /// Newest live articles across every category.
    async fn query_latest(&self, limit: usize) -> Result<Vec<Article>>;

    /// Live articles matching `filter`, newest first, plus the total match count.
    async fn query_feed(&self, filter: &ArticleFilter, limit: usize, offset: usize) -> Result<(Vec<Article>, u64)>;

    /// Returns the new count, or `None` if the article does not exist.
    async fn increment_view_count(&self, id: &str) -> Result<Option<i64>>;

    /// Delete every expired article; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;

    /// Insert categories that are not there yet; returns how many were added.
    async fn seed_categories(&self, categories: &[CategoryInfo]) -> Result<usize>;

    /// Active categories ordered by sort order.
    async fn list_categories(&self) -> Result<Vec<CategoryInfo>>;

    /// Recent articles, optionally restricted to `categories`.
    ///
    /// With categories, each gets a budget of `ceil(limit / n)`, the results
    /// are merged newest first and cut to `limit`.
    async fn query_recent(&self, limit: usize, categories: Option<&[Category]>) -> Result<Vec<Article>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let categories = match categories {
            Some(categories) if !categories.is_empty() => categories,
            _ => return self.query_latest(limit).await,
        };

        let budget = limit.div_ceil(categories.len());
        let pages =
            futures::future::try_join_all(categories.iter().map(|c| self.query_by_category(*c, budget, None))).await?;

        let mut merged: Vec<Article> = pages.into_iter().flat_map(|page| page.articles).collect();
        sort_newest_first(&mut merged);
        merged.truncate(limit);
        Ok(merged)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Replace the user's preferences wholesale.
    async fn save_preferences(&self, preference: UserPreference) -> Result<()>;

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreference>>;

    /// Idempotent; an existing bookmark keeps its original timestamp.
    async fn add_bookmark(&self, user_id: &str, article_id: &str) -> Result<Bookmark>;

    /// `false` when there was nothing to remove.
    async fn remove_bookmark(&self, user_id: &str, article_id: &str) -> Result<bool>;

    /// Most recent first.
    async fn list_bookmarks(&self, user_id: &str, limit: usize) -> Result<Vec<Bookmark>>;

    /// Which of `article_ids` the user has bookmarked.
    async fn bookmarked_ids(&self, user_id: &str, article_ids: &[String]) -> Result<HashSet<String>>;

    async fn record_activity(
        &self,
        user_id: &str,
        article_id: &str,
        action: ActivityAction,
        mood: Option<Mood>,
    ) -> Result<ActivityEvent>;

    /// Most recent first.
    async fn list_activity(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityEvent>>;

    async fn purge_expired_activity(&self) -> Result<u64>;
}

/// Everything the feed composer and the scheduler need from storage.
pub trait NewsStore: ArticleStore + UserStore {}

impl<T: ArticleStore + UserStore> NewsStore for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

/// Open the configured backend and make sure the category catalog exists.
pub async fn open_store(
    backend: StoreBackend,
    database_url: Option<&str>,
    config: StoreConfig,
    categories: &[CategoryInfo],
) -> Result<Arc<dyn NewsStore>> {
    let store: Arc<dyn NewsStore> = match backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(config)),
        StoreBackend::Postgres => {
            let database_url = database_url.ok_or_else(|| {
                AggregatorError::Config("DATABASE_URL is required for the postgres store".to_string())
            })?;
            let store = PgStore::connect(database_url, config).await?;
            store.setup_schema().await?;
            Arc::new(store)
        }
    };

    let added = store.seed_categories(categories).await?;
    info!("Opened {:?} store ({} categories seeded)", backend, added);
    Ok(store)
}
