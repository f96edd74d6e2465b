use crate::news_utils::{text, url};
use crate::types::{Category, EnrichedArticle, RawArticle, Sentiment};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_IMAGE: &str =
    "https://images.unsplash.com/photo-1504711434969-e33886168f5c?ixlib=rb-4.0.3&auto=format&fit=crop&w=1200&q=80";

/// Keyword tables and fallbacks driving the enrichment heuristics.
///
/// Everything here is data so deployments can tune the lists (or swap the
/// whole thing for classifier output) without touching `ContentEnricher`.
#[derive(Debug, Clone)]
pub struct EnrichmentRules {
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    /// Tags every article in a category receives
    pub category_moods: HashMap<Category, Vec<String>>,
    /// (any of these keywords, tag)
    pub keyword_moods: Vec<(Vec<String>, String)>,
    pub unhealthy_keywords: Vec<String>,
    pub words_per_minute: u32,
    pub fallback_images: HashMap<Category, String>,
    pub default_image: String,
    /// Image URLs containing any of these are treated as missing
    pub placeholder_markers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for EnrichmentRules {
    fn default() -> Self {
        let category_moods = [
            (Category::Entertainment, &["happy", "relaxed"][..]),
            (Category::Sports, &["energetic", "competitive"][..]),
            (Category::Health, &["caring", "informed"][..]),
            (Category::Science, &["curious", "intelligent"][..]),
            (Category::Technology, &["innovative", "progressive"][..]),
        ]
        .into_iter()
        .map(|(category, tags)| (category, strings(tags)))
        .collect();

        let keyword_moods = vec![
            (strings(&["inspire", "motivation"]), "inspired".to_string()),
            (strings(&["calm", "peace"]), "calm".to_string()),
            (strings(&["exciting", "adventure"]), "excited".to_string()),
            (strings(&["learn", "education"]), "learning".to_string()),
        ];

        let unsplash = |photo: &str| {
            format!(
                "https://images.unsplash.com/{}?ixlib=rb-4.0.3&auto=format&fit=crop&w=1200&q=80",
                photo
            )
        };
        let fallback_images = [
            (Category::Business, "photo-1507003211169-0a1dd7228f2d"),
            (Category::Entertainment, "photo-1489599651771-5f2d7e5b2c71"),
            (Category::General, "photo-1504711434969-e33886168f5c"),
            (Category::Health, "photo-1559757148-5c350d0d3c56"),
            (Category::Science, "photo-1532094349884-543bc11b234d"),
            (Category::Sports, "photo-1461896836934-ffe607ba8211"),
            (Category::Technology, "photo-1518709268805-4e9042af2176"),
            (Category::Politics, "photo-1529107386315-e1a2ed48a08b"),
            (Category::World, "photo-1516321318423-f06f85e504b3"),
            (Category::Finance, "photo-1590283603385-17ffb3a7f29f"),
            (Category::Lifestyle, "photo-1544367567-0f2fcb009e0b"),
            (Category::Education, "photo-1481627834876-b7833e8f5570"),
            (Category::Environment, "photo-1441974231531-c6227db76b6e"),
            (Category::Travel, "photo-1488646953014-85cb44e25828"),
            (Category::Food, "photo-1504674900247-0877df9cc836"),
            (Category::Gaming, "photo-1552820728-8b83bb6b773f"),
        ]
        .into_iter()
        .map(|(category, photo)| (category, unsplash(photo)))
        .collect();

        Self {
            positive_keywords: strings(&[
                "success", "win", "achievement", "breakthrough", "innovation", "growth", "positive", "good", "great",
                "excellent", "amazing", "wonderful", "fantastic", "celebrate",
            ]),
            negative_keywords: strings(&[
                "crisis", "disaster", "failure", "death", "war", "conflict", "problem", "issue", "concern", "worry",
                "danger", "risk", "threat", "terrible", "awful", "horrible",
            ]),
            category_moods,
            keyword_moods,
            unhealthy_keywords: strings(&[
                "violence", "murder", "killing", "death", "suicide", "terrorism", "war crimes", "graphic",
                "disturbing", "trauma", "abuse", "assault", "harassment", "drug abuse", "addiction", "overdose",
                "hate crime", "discrimination",
            ]),
            words_per_minute: 200,
            fallback_images,
            default_image: DEFAULT_IMAGE.to_string(),
            placeholder_markers: strings(&["placeholder"]),
        }
    }
}

/// Derives sentiment, mood tags, read time, safety flag and image for raw
/// provider articles. Pure: no clock, no I/O.
#[derive(Debug, Clone, Default)]
pub struct ContentEnricher {
    rules: EnrichmentRules,
}

impl ContentEnricher {
    pub fn new(rules: EnrichmentRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &EnrichmentRules {
        &self.rules
    }

    pub fn analyze_sentiment(&self, title: &str, description: &str) -> Sentiment {
        let text = text::searchable_text(title, description);
        let positive = text::count_matches(&text, &self.rules.positive_keywords);
        let negative = text::count_matches(&text, &self.rules.negative_keywords);

        if positive > negative {
            Sentiment::Positive
        } else if negative > positive {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    /// Sentiment first, then category tags, then keyword tags; no repeats.
    pub fn derive_mood_tags(&self, title: &str, description: &str, category: Category, sentiment: Sentiment) -> Vec<String> {
        let text = text::searchable_text(title, description);

        let mut candidates = vec![sentiment.as_str().to_string()];
        if let Some(tags) = self.rules.category_moods.get(&category) {
            candidates.extend(tags.iter().cloned());
        }
        for (keywords, tag) in &self.rules.keyword_moods {
            if text::contains_any(&text, keywords) {
                candidates.push(tag.clone());
            }
        }

        let mut seen = HashSet::new();
        candidates.retain(|tag| seen.insert(tag.clone()));
        candidates
    }

    pub fn estimate_read_time(&self, description: &str) -> u32 {
        text::estimate_reading_time_minutes(description, self.rules.words_per_minute)
    }

    pub fn is_healthy_content(&self, title: &str, description: &str) -> bool {
        let text = text::searchable_text(title, description);
        !text::contains_any(&text, &self.rules.unhealthy_keywords)
    }

    pub fn resolve_image(&self, candidate: Option<&str>, category: Category) -> String {
        if let Some(candidate) = candidate.map(str::trim) {
            let lower = candidate.to_lowercase();
            let is_placeholder = self.rules.placeholder_markers.iter().any(|m| lower.contains(m.as_str()));
            if url::is_http_url(candidate) && !is_placeholder {
                return candidate.to_string();
            }
        }

        self.rules
            .fallback_images
            .get(&category)
            .cloned()
            .unwrap_or_else(|| self.rules.default_image.clone())
    }

    /// Turn a raw provider article into a storable one.
    ///
    /// Returns `None` for articles without a title or URL; those can be
    /// neither deduplicated nor shown.
    pub fn enrich(&self, raw: &RawArticle, category: Category, ingested_at: DateTime<Utc>) -> Option<EnrichedArticle> {
        let title = raw.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let article_url = raw.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;

        let description = raw
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or(raw.content.as_deref())
            .unwrap_or("")
            .trim()
            .to_string();

        let published_at = raw.published_at.unwrap_or(ingested_at);
        let sentiment = self.analyze_sentiment(title, &description);
        let mood_tags = self.derive_mood_tags(title, &description, category, sentiment);

        let source = raw
            .source_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&raw.provider)
            .to_string();
        let author = raw
            .author
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or("Unknown")
            .to_string();

        debug!("Enriched '{}' as {} {:?}", title, sentiment, mood_tags);

        Some(EnrichedArticle {
            id: article_id(&raw.provider, title, published_at),
            title: title.to_string(),
            read_time: self.estimate_read_time(&description),
            is_healthy_content: self.is_healthy_content(title, &description),
            description,
            url: article_url.to_string(),
            image_url: self.resolve_image(raw.image_url.as_deref(), category),
            source,
            author,
            published_at,
            category,
            sentiment,
            mood_tags,
        })
    }
}

/// Stable id for a provider article: the same headline from the same
/// provider at the same publish time always maps to the same id.
pub fn article_id(provider: &str, title: &str, published_at: DateTime<Utc>) -> String {
    let name = format!("{}|{}|{}", provider, title, published_at.to_rfc3339());
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes());
    format!("{}_{}", provider, uuid.simple())
}
