use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Fixed set of news categories. The ordering of variants is the ordering
/// used for range keys, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
    Politics,
    World,
    Finance,
    Lifestyle,
    Education,
    Environment,
    Travel,
    Food,
    Gaming,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::General,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
        Category::Politics,
        Category::World,
        Category::Finance,
        Category::Lifestyle,
        Category::Education,
        Category::Environment,
        Category::Travel,
        Category::Food,
        Category::Gaming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Politics => "politics",
            Category::World => "world",
            Category::Finance => "finance",
            Category::Lifestyle => "lifestyle",
            Category::Education => "education",
            Category::Environment => "environment",
            Category::Travel => "travel",
            Category::Food => "food",
            Category::Gaming => "gaming",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| UnknownVariant::new("category", s))
    }
}

/// Moods a reader can report when asking for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Excited,
    Motivated,
    Relaxed,
    Sad,
    Stressed,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Excited,
        Mood::Motivated,
        Mood::Relaxed,
        Mood::Sad,
        Mood::Stressed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Excited => "excited",
            Mood::Motivated => "motivated",
            Mood::Relaxed => "relaxed",
            Mood::Sad => "sad",
            Mood::Stressed => "stressed",
        }
    }

    /// Moods that get the strictest content gate.
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, Mood::Sad | Mood::Stressed)
    }

    pub fn is_uplifting(&self) -> bool {
        matches!(self, Mood::Excited | Mood::Motivated)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mood::ALL
            .iter()
            .copied()
            .find(|mood| mood.as_str() == wanted)
            .ok_or_else(|| UnknownVariant::new("mood", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            _ => Err(UnknownVariant::new("sentiment", s)),
        }
    }
}

/// What a reader did with an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    View,
    Bookmark,
    Share,
    Like,
    ReadComplete,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::View => "view",
            ActivityAction::Bookmark => "bookmark",
            ActivityAction::Share => "share",
            ActivityAction::Like => "like",
            ActivityAction::ReadComplete => "read_complete",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "view" => Ok(ActivityAction::View),
            "bookmark" => Ok(ActivityAction::Bookmark),
            "share" => Ok(ActivityAction::Share),
            "like" => Ok(ActivityAction::Like),
            "read_complete" => Ok(ActivityAction::ReadComplete),
            _ => Err(UnknownVariant::new("activity action", s)),
        }
    }
}

/// An article as a provider handed it to us, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub provider: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// An article with all derived metadata attached, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: String,
    pub source: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub category: Category,
    pub read_time: u32,
    pub sentiment: Sentiment,
    pub mood_tags: Vec<String>,
    pub is_healthy_content: bool,
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: String,
    pub source: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub category: Category,
    pub read_time: u32,
    pub sentiment: Sentiment,
    pub mood_tags: Vec<String>,
    pub is_healthy_content: bool,
    pub is_active: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Article {
    pub fn from_enriched(article: EnrichedArticle, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: article.id,
            title: article.title,
            description: article.description,
            url: article.url,
            image_url: article.image_url,
            source: article.source,
            author: article.author,
            published_at: article.published_at,
            category: article.category,
            read_time: article.read_time,
            sentiment: article.sentiment,
            mood_tags: article.mood_tags,
            is_healthy_content: article.is_healthy_content,
            is_active: true,
            view_count: 0,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Visible to readers: active and not past its expiry.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn has_mood_tag(&self, tag: &str) -> bool {
        self.mood_tags.iter().any(|t| t == tag)
    }
}

/// Reference data describing one category. Seeded once, never edited by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub name: Category,
    pub display_name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub is_active: bool,
    pub sort_order: i32,
}

/// A user's saved news preferences. Saved wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    pub interests: Vec<Category>,
    pub setup_complete: bool,
    /// Priority per category name, e.g. `"health" -> "high"`.
    pub preferences: BTreeMap<String, String>,
}

impl UserPreference {
    /// What an unknown user looks like: nothing selected, onboarding not done.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            interests: Vec::new(),
            setup_complete: false,
            preferences: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub user_id: String,
    pub article_id: String,
    pub bookmarked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: String,
    pub article_id: String,
    pub action: ActivityAction,
    pub mood: Option<Mood>,
    pub occurred_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// Object style note:
// These are plain data. Anything that needs a clock, a store or a network
// connection lives in the aggregator crate and takes these by value or
// reference.
