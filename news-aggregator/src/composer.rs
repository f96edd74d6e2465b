use crate::resolver::{dedupe_categories, MoodTable};
use crate::store::{ArticleFilter, NewsStore};
use crate::types::{
    ActivityAction, ActivityEvent, AggregatorError, Article, Bookmark, Category, CategoryInfo, Mood, Result,
    Sentiment, UserPreference,
};
use chrono::{Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on activity events folded into reading stats.
const STATS_ACTIVITY_WINDOW: usize = 10_000;
const FAVOURITE_CATEGORY_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub max_limit: usize,
    pub default_limit: usize,
    /// Only articles published within this window are served
    pub freshness: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_limit: 50,
            default_limit: 20,
            freshness: Duration::days(7),
        }
    }
}

/// Hard filter applied to every mood-driven feed.
#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    /// Title terms that keep an article away from sad or stressed readers
    pub title_denylist: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            title_denylist: vec!["crisis".to_string()],
        }
    }
}

impl SafetyPolicy {
    pub fn allows(&self, mood: Option<Mood>, article: &Article) -> bool {
        let Some(mood) = mood else {
            return true;
        };

        if mood.is_vulnerable() {
            let title = article.title.to_lowercase();
            article.sentiment != Sentiment::Negative
                && article.is_healthy_content
                && !self
                    .title_denylist
                    .iter()
                    .any(|term| title.contains(&term.to_lowercase()))
        } else if mood.is_uplifting() {
            article.sentiment != Sentiment::Negative
        } else {
            article.is_healthy_content
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedRequest {
    pub mood: Option<Mood>,
    pub categories: Option<Vec<Category>>,
    pub source: Option<String>,
    /// Zero means the configured default
    pub limit: usize,
    pub offset: usize,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedArticle {
    #[serde(flatten)]
    pub article: Article,
    pub is_bookmarked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
    /// Matches before the safety gate
    pub total_count: u64,
    pub has_more: bool,
    pub next_offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub articles: Vec<FeedArticle>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalizedFeed {
    pub articles: Vec<FeedArticle>,
    /// `false` when the user has no interests and the feed is just recent news
    pub personalized: bool,
    pub interests: Vec<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookmarkEntry {
    pub bookmark: Bookmark,
    /// `None` once the article has expired and been purged
    pub article: Option<Article>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadingStats {
    pub user_id: String,
    pub articles_viewed: usize,
    pub articles_completed: usize,
    pub bookmarks: usize,
    pub favourite_categories: Vec<Category>,
    pub total_reading_minutes: u64,
}

/// Read side of the aggregator: feeds, bookmarks, preferences and activity.
pub struct FeedComposer {
    store: Arc<dyn NewsStore>,
    moods: MoodTable,
    safety: SafetyPolicy,
    config: FeedConfig,
}

impl FeedComposer {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self {
            store,
            moods: MoodTable::default(),
            safety: SafetyPolicy::default(),
            config: FeedConfig::default(),
        }
    }

    pub fn with_mood_table(mut self, moods: MoodTable) -> Self {
        self.moods = moods;
        self
    }

    pub fn with_safety_policy(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_config(mut self, config: FeedConfig) -> Self {
        self.config = config;
        self
    }

    fn clamp_limit(&self, limit: usize) -> usize {
        let limit = if limit == 0 { self.config.default_limit } else { limit };
        limit.clamp(1, self.config.max_limit.max(1))
    }

    /// Categories a request should draw from; empty means all of them.
    async fn target_categories(&self, request: &FeedRequest, user_id: Option<&str>) -> Result<Vec<Category>> {
        let explicit = request.categories.as_deref();

        match (request.mood, user_id) {
            (Some(mood), Some(user_id)) => {
                let preferences = self.get_preferences(user_id).await?;
                Ok(self.moods.resolve_categories(mood, &preferences.interests, explicit))
            }
            _ => Ok(explicit.map(dedupe_categories).unwrap_or_default()),
        }
    }

    pub async fn get_feed(&self, request: FeedRequest) -> Result<FeedResponse> {
        let user_id = match request.user_id.as_deref() {
            Some(id) => Some(validate_user_id(id)?),
            None => None,
        };
        let limit = self.clamp_limit(request.limit);
        let offset = request.offset;

        let categories = self.target_categories(&request, user_id).await?;
        let filter = ArticleFilter {
            categories,
            source: request.source.clone().filter(|s| !s.trim().is_empty()),
            published_after: Some(Utc::now() - self.config.freshness),
        };
        debug!("Feed query: {:?} limit={} offset={}", filter, limit, offset);

        let (articles, total_count) = self.store.query_feed(&filter, limit, offset).await?;
        let fetched = articles.len();
        let articles: Vec<Article> = articles
            .into_iter()
            .filter(|a| self.safety.allows(request.mood, a))
            .collect();
        if articles.len() < fetched {
            debug!("Safety gate removed {} of {} articles", fetched - articles.len(), fetched);
        }

        let articles = self.flag_bookmarks(user_id, articles).await?;

        let next_offset = offset.saturating_add(limit);
        Ok(FeedResponse {
            articles,
            pagination: Pagination {
                limit,
                offset,
                total_count,
                has_more: (next_offset as u64) < total_count,
                next_offset,
            },
        })
    }

    /// Personalized feed for a known user in a given mood.
    pub async fn get_articles_by_mood(
        &self,
        mood: Mood,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<FeedResponse> {
        let user_id = validate_user_id(user_id)?;
        self.get_feed(FeedRequest {
            mood: Some(mood),
            limit,
            offset,
            user_id: Some(user_id.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Newest articles across the user's interests, or across everything
    /// when the user has none.
    pub async fn get_personalized_feed(&self, user_id: &str, limit: usize) -> Result<PersonalizedFeed> {
        let user_id = validate_user_id(user_id)?;
        let limit = self.clamp_limit(limit);
        let interests = self.get_preferences(user_id).await?.interests;

        let articles = if interests.is_empty() {
            debug!("No interests for {}, serving recent articles", user_id);
            self.store.query_recent(limit, None).await?
        } else {
            self.store.query_recent(limit, Some(interests.as_slice())).await?
        };

        Ok(PersonalizedFeed {
            personalized: !interests.is_empty(),
            interests,
            articles: self.flag_bookmarks(Some(user_id), articles).await?,
        })
    }

    /// Articles carrying `tag` among their mood tags, newest first.
    pub async fn get_articles_by_mood_tag(&self, tag: &str, limit: usize) -> Result<Vec<Article>> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(AggregatorError::Validation("mood tag is required".to_string()));
        }
        self.store.query_by_mood(&tag, self.clamp_limit(limit)).await
    }

    async fn flag_bookmarks(&self, user_id: Option<&str>, articles: Vec<Article>) -> Result<Vec<FeedArticle>> {
        let bookmarked = match user_id {
            Some(user_id) if !articles.is_empty() => {
                let ids: Vec<String> = articles.iter().map(|a| a.id.clone()).collect();
                self.store.bookmarked_ids(user_id, &ids).await?
            }
            _ => HashSet::new(),
        };

        Ok(articles
            .into_iter()
            .map(|article| FeedArticle {
                is_bookmarked: bookmarked.contains(&article.id),
                article,
            })
            .collect())
    }

    pub async fn bookmark(&self, user_id: &str, article_id: &str, mood: Option<Mood>) -> Result<Bookmark> {
        let user_id = validate_user_id(user_id)?;
        let article_id = validate_article_id(article_id)?;

        if self.store.get(article_id).await?.is_none() {
            return Err(AggregatorError::not_found("article", article_id));
        }

        let bookmark = self.store.add_bookmark(user_id, article_id).await?;
        self.store
            .record_activity(user_id, article_id, ActivityAction::Bookmark, mood)
            .await?;
        info!("User {} bookmarked {}", user_id, article_id);
        Ok(bookmark)
    }

    /// `false` when the bookmark did not exist.
    pub async fn unbookmark(&self, user_id: &str, article_id: &str) -> Result<bool> {
        let user_id = validate_user_id(user_id)?;
        let article_id = validate_article_id(article_id)?;
        self.store.remove_bookmark(user_id, article_id).await
    }

    pub async fn is_bookmarked(&self, user_id: &str, article_id: &str) -> Result<bool> {
        let user_id = validate_user_id(user_id)?;
        let article_id = validate_article_id(article_id)?;
        let ids = self.store.bookmarked_ids(user_id, &[article_id.to_string()]).await?;
        Ok(ids.contains(article_id))
    }

    /// Most recent bookmarks first, with the article when it still exists.
    pub async fn list_bookmarks(&self, user_id: &str, limit: usize) -> Result<Vec<BookmarkEntry>> {
        let user_id = validate_user_id(user_id)?;
        let limit = self.clamp_limit(limit);
        let bookmarks = self.store.list_bookmarks(user_id, limit).await?;

        let articles = join_all(bookmarks.iter().map(|b| self.store.get(&b.article_id))).await;
        bookmarks
            .into_iter()
            .zip(articles)
            .map(|(bookmark, article)| article.map(|article| BookmarkEntry { bookmark, article }))
            .collect()
    }

    /// Record a user action. A `view` also bumps the article's view count;
    /// an unknown article is logged and otherwise ignored.
    pub async fn track_activity(
        &self,
        user_id: &str,
        article_id: &str,
        action: ActivityAction,
        mood: Option<Mood>,
    ) -> Result<ActivityEvent> {
        let user_id = validate_user_id(user_id)?;
        let article_id = validate_article_id(article_id)?;

        let event = self.store.record_activity(user_id, article_id, action, mood).await?;

        if action == ActivityAction::View {
            match self.store.increment_view_count(article_id).await? {
                Some(count) => debug!("Article {} now has {} views", article_id, count),
                None => debug!("View tracked for unknown article {}", article_id),
            }
        }
        Ok(event)
    }

    pub async fn get_categories(&self) -> Result<Vec<CategoryInfo>> {
        self.store.list_categories().await
    }

    /// Overwrite the user's preferences.
    pub async fn save_preferences(&self, preference: UserPreference) -> Result<UserPreference> {
        validate_user_id(&preference.user_id)?;
        let preference = UserPreference {
            interests: dedupe_categories(&preference.interests),
            ..preference
        };
        self.store.save_preferences(preference.clone()).await?;
        info!(
            "Saved preferences for {} ({} interests)",
            preference.user_id,
            preference.interests.len()
        );
        Ok(preference)
    }

    /// Stored preferences, or the empty set for an unknown user.
    pub async fn get_preferences(&self, user_id: &str) -> Result<UserPreference> {
        let user_id = validate_user_id(user_id)?;
        Ok(self
            .store
            .get_preferences(user_id)
            .await?
            .unwrap_or_else(|| UserPreference::empty(user_id)))
    }

    pub async fn reading_stats(&self, user_id: &str) -> Result<ReadingStats> {
        let user_id = validate_user_id(user_id)?;
        let activity = self.store.list_activity(user_id, STATS_ACTIVITY_WINDOW).await?;
        let bookmarks = self.store.list_bookmarks(user_id, STATS_ACTIVITY_WINDOW).await?;

        let mut views: HashMap<String, usize> = HashMap::new();
        let mut completed: HashSet<String> = HashSet::new();
        for event in &activity {
            match event.action {
                ActivityAction::View => *views.entry(event.article_id.clone()).or_default() += 1,
                ActivityAction::ReadComplete => {
                    completed.insert(event.article_id.clone());
                }
                _ => {}
            }
        }

        let ids: Vec<&String> = views.keys().chain(completed.iter()).collect::<HashSet<_>>().into_iter().collect();
        let lookups = join_all(ids.iter().map(|id| self.store.get(id))).await;
        let mut articles: HashMap<&str, Article> = HashMap::new();
        for (id, article) in ids.iter().zip(lookups) {
            if let Some(article) = article? {
                articles.insert(id.as_str(), article);
            }
        }

        let mut category_views: BTreeMap<Category, usize> = BTreeMap::new();
        for (id, count) in &views {
            if let Some(article) = articles.get(id.as_str()) {
                *category_views.entry(article.category).or_default() += count;
            }
        }
        let mut ranked: Vec<(Category, usize)> = category_views.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let total_reading_minutes = completed
            .iter()
            .filter_map(|id| articles.get(id.as_str()))
            .map(|a| a.read_time as u64)
            .sum();

        Ok(ReadingStats {
            user_id: user_id.to_string(),
            articles_viewed: views.len(),
            articles_completed: completed.len(),
            bookmarks: bookmarks.len(),
            favourite_categories: ranked
                .into_iter()
                .take(FAVOURITE_CATEGORY_COUNT)
                .map(|(category, _)| category)
                .collect(),
            total_reading_minutes,
        })
    }
}

fn validate_user_id(user_id: &str) -> Result<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(AggregatorError::Validation("user id is required".to_string()));
    }
    Ok(trimmed)
}

fn validate_article_id(article_id: &str) -> Result<&str> {
    let trimmed = article_id.trim();
    if trimmed.is_empty() {
        return Err(AggregatorError::Validation("article id is required".to_string()));
    }
    Ok(trimmed)
}
