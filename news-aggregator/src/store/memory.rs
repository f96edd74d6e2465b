use super::{ArticleFilter, ArticlePage, ArticleStore, Cursor, PutOutcome, StoreConfig, UserStore};
use crate::catalog;
use crate::types::{
    ActivityAction, ActivityEvent, Article, Bookmark, Category, CategoryInfo, EnrichedArticle, Mood, Result,
    UserPreference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Range key: publish time, then id to keep keys unique.
type RangeKey = (DateTime<Utc>, String);

#[derive(Default)]
struct Inner {
    articles: HashMap<String, Article>,
    by_url: HashMap<String, String>,
    by_category: HashMap<Category, BTreeSet<RangeKey>>,
    by_mood: HashMap<String, BTreeSet<RangeKey>>,
    by_time: BTreeSet<RangeKey>,
    categories: BTreeMap<Category, CategoryInfo>,
    preferences: HashMap<String, UserPreference>,
    bookmarks: BTreeMap<(String, String), Bookmark>,
    // (user, occurred_at, sequence)
    activity: BTreeMap<(String, DateTime<Utc>, u64), ActivityEvent>,
    activity_seq: u64,
}

impl Inner {
    fn insert_article(&mut self, article: Article) {
        let key: RangeKey = (article.published_at, article.id.clone());
        self.by_category.entry(article.category).or_default().insert(key.clone());
        for tag in &article.mood_tags {
            self.by_mood.entry(tag.clone()).or_default().insert(key.clone());
        }
        self.by_time.insert(key);
        self.by_url.insert(article.url.clone(), article.id.clone());
        self.articles.insert(article.id.clone(), article);
    }

    fn remove_article(&mut self, id: &str) -> bool {
        let Some(article) = self.articles.remove(id) else {
            return false;
        };
        let key: RangeKey = (article.published_at, article.id.clone());
        if let Some(keys) = self.by_category.get_mut(&article.category) {
            keys.remove(&key);
        }
        for tag in &article.mood_tags {
            if let Some(keys) = self.by_mood.get_mut(tag) {
                keys.remove(&key);
            }
        }
        self.by_time.remove(&key);
        self.by_url.remove(&article.url);
        true
    }

    /// Walk `keys` newest first and collect up to `limit` live articles.
    fn collect_live<'a>(
        &self,
        keys: impl Iterator<Item = &'a RangeKey>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<Article> {
        keys.filter_map(|(_, id)| self.articles.get(id))
            .filter(|a| a.is_live(now))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// In-process key-value range store.
///
/// Articles sit in ordered sets keyed by `(published_at, id)` per category,
/// per mood tag and globally. One lock guards every index, so a put or a
/// purge of a record is never half-visible to readers.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    config: StoreConfig,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            config,
        }
    }

    /// Number of stored articles, expired ones included.
    pub async fn article_count(&self) -> usize {
        self.inner.read().await.articles.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn put(&self, article: EnrichedArticle) -> Result<PutOutcome> {
        let mut inner = self.inner.write().await;

        if inner.by_url.contains_key(&article.url) || inner.articles.contains_key(&article.id) {
            debug!("Skipping already stored article: {}", article.url);
            return Ok(PutOutcome::Duplicate);
        }

        let now = Utc::now();
        let expires_at = now + self.config.article_ttl;
        inner.insert_article(Article::from_enriched(article, now, expires_at));
        Ok(PutOutcome::Created)
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        Ok(self.inner.read().await.articles.get(id).cloned())
    }

    async fn query_by_category(&self, category: Category, limit: usize, cursor: Option<&str>) -> Result<ArticlePage> {
        let cursor = cursor.map(Cursor::decode).transpose()?;
        let now = Utc::now();
        let inner = self.inner.read().await;

        let Some(keys) = inner.by_category.get(&category) else {
            return Ok(ArticlePage::default());
        };

        let articles = match cursor {
            Some(cursor) => {
                let upper: RangeKey = (cursor.published_at, cursor.id);
                inner.collect_live(keys.range(..upper).rev(), limit.saturating_add(1), now)
            }
            None => inner.collect_live(keys.iter().rev(), limit.saturating_add(1), now),
        };

        Ok(ArticlePage::from_overfetch(articles, limit))
    }

    async fn query_by_mood(&self, mood_tag: &str, limit: usize) -> Result<Vec<Article>> {
        let now = Utc::now();
        let inner = self.inner.read().await;

        Ok(match inner.by_mood.get(mood_tag) {
            Some(keys) => inner.collect_live(keys.iter().rev(), limit, now),
            None => Vec::new(),
        })
    }

    async fn query_latest(&self, limit: usize) -> Result<Vec<Article>> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner.collect_live(inner.by_time.iter().rev(), limit, now))
    }

    async fn query_feed(&self, filter: &ArticleFilter, limit: usize, offset: usize) -> Result<(Vec<Article>, u64)> {
        let now = Utc::now();
        let inner = self.inner.read().await;

        let mut total = 0u64;
        let mut page = Vec::with_capacity(limit);
        for (_, id) in inner.by_time.iter().rev() {
            let Some(article) = inner.articles.get(id) else {
                continue;
            };
            if !article.is_live(now) || !filter.matches(article) {
                continue;
            }
            if total as usize >= offset && page.len() < limit {
                page.push(article.clone());
            }
            total += 1;
        }

        Ok((page, total))
    }

    async fn increment_view_count(&self, id: &str) -> Result<Option<i64>> {
        let mut inner = self.inner.write().await;
        Ok(inner.articles.get_mut(id).map(|article| {
            article.view_count += 1;
            article.view_count
        }))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let expired: Vec<String> = inner
            .articles
            .values()
            .filter(|a| a.is_expired(now))
            .map(|a| a.id.clone())
            .collect();

        let mut removed = 0u64;
        for id in expired {
            if inner.remove_article(&id) {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Purged {} expired articles", removed);
        }
        Ok(removed)
    }

    async fn seed_categories(&self, categories: &[CategoryInfo]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut added = 0;
        for category in categories {
            if !inner.categories.contains_key(&category.name) {
                inner.categories.insert(category.name, category.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>> {
        let inner = self.inner.read().await;
        Ok(catalog::sorted_active(inner.categories.values().cloned().collect()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn save_preferences(&self, preference: UserPreference) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.preferences.insert(preference.user_id.clone(), preference);
        Ok(())
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreference>> {
        Ok(self.inner.read().await.preferences.get(user_id).cloned())
    }

    async fn add_bookmark(&self, user_id: &str, article_id: &str) -> Result<Bookmark> {
        let mut inner = self.inner.write().await;
        let bookmark = inner
            .bookmarks
            .entry((user_id.to_string(), article_id.to_string()))
            .or_insert_with(|| Bookmark {
                user_id: user_id.to_string(),
                article_id: article_id.to_string(),
                bookmarked_at: Utc::now(),
            });
        Ok(bookmark.clone())
    }

    async fn remove_bookmark(&self, user_id: &str, article_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .bookmarks
            .remove(&(user_id.to_string(), article_id.to_string()))
            .is_some())
    }

    async fn list_bookmarks(&self, user_id: &str, limit: usize) -> Result<Vec<Bookmark>> {
        let inner = self.inner.read().await;
        let mut bookmarks: Vec<Bookmark> = inner
            .bookmarks
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookmarks.sort_by(|a, b| b.bookmarked_at.cmp(&a.bookmarked_at));
        bookmarks.truncate(limit);
        Ok(bookmarks)
    }

    async fn bookmarked_ids(&self, user_id: &str, article_ids: &[String]) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(article_ids
            .iter()
            .filter(|id| inner.bookmarks.contains_key(&(user_id.to_string(), (*id).clone())))
            .cloned()
            .collect())
    }

    async fn record_activity(
        &self,
        user_id: &str,
        article_id: &str,
        action: ActivityAction,
        mood: Option<Mood>,
    ) -> Result<ActivityEvent> {
        let now = Utc::now();
        let event = ActivityEvent {
            user_id: user_id.to_string(),
            article_id: article_id.to_string(),
            action,
            mood,
            occurred_at: now,
            expires_at: now + self.config.activity_ttl,
        };

        let mut inner = self.inner.write().await;
        inner.activity_seq += 1;
        let key = (user_id.to_string(), now, inner.activity_seq);
        inner.activity.insert(key, event.clone());
        Ok(event)
    }

    async fn list_activity(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityEvent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .activity
            .iter()
            .rev()
            .filter(|((user, _, _), _)| user == user_id)
            .map(|(_, event)| event.clone())
            .take(limit)
            .collect())
    }

    async fn purge_expired_activity(&self) -> Result<u64> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let before = inner.activity.len();
        inner.activity.retain(|_, event| event.expires_at > now);
        Ok((before - inner.activity.len()) as u64)
    }
}
