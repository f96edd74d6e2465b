//! Command-line and environment configuration for the `news-aggregator` binary.

use crate::composer::FeedConfig;
use crate::scheduler::ScheduleConfig;
use crate::sources::gnews::GNEWS_BASE_URL;
use crate::sources::newsapi::NEWSAPI_BASE_URL;
use crate::store::{StoreBackend, StoreConfig};
use crate::types::{Category, FetchConfig, Mood};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// Mood-aware news aggregator
#[derive(Parser, Debug, Clone)]
#[command(name = "news-aggregator")]
#[command(about = "Fetches, enriches and serves mood-filtered news")]
pub struct AppConfig {
    /// Storage backend
    #[arg(long, env = "NEWS_STORE", value_enum, default_value = "memory")]
    pub store: StoreBackend,

    /// PostgreSQL connection string (postgres backend only)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(flatten)]
    pub providers: ProviderArgs,

    #[command(flatten)]
    pub schedule: ScheduleArgs,

    /// Days an article is kept after ingestion
    #[arg(long, env = "ARTICLE_TTL_DAYS", default_value = "10")]
    pub article_ttl_days: i64,

    /// Days activity events are kept
    #[arg(long, env = "ACTIVITY_TTL_DAYS", default_value = "90")]
    pub activity_ttl_days: i64,

    /// Only articles published within this many days are served
    #[arg(long, env = "FRESHNESS_DAYS", default_value = "7")]
    pub freshness_days: i64,

    /// Largest page a feed request may ask for
    #[arg(long, env = "FEED_MAX_LIMIT", default_value = "50")]
    pub feed_max_limit: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// NewsAPI.org key; NewsAPI is skipped without one
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// GNews key; GNews is skipped without one
    #[arg(long, env = "GNEWS_API_KEY", hide_env_values = true)]
    pub gnews_api_key: Option<String>,

    #[arg(long, env = "NEWSAPI_BASE_URL", default_value = NEWSAPI_BASE_URL)]
    pub newsapi_base_url: String,

    #[arg(long, env = "GNEWS_BASE_URL", default_value = GNEWS_BASE_URL)]
    pub gnews_base_url: String,

    /// Country code sent to both providers
    #[arg(long, env = "NEWS_COUNTRY", default_value = "us")]
    pub country: String,

    /// Language code sent to GNews
    #[arg(long, env = "NEWS_LANG", default_value = "en")]
    pub lang: String,

    /// Articles requested per provider and category
    #[arg(long, env = "PROVIDER_PAGE_SIZE", default_value = "10")]
    pub page_size: u32,

    /// Seconds before a provider call is abandoned
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value = "10")]
    pub timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    #[arg(long, env = "INGEST_INTERVAL_HOURS", default_value = "2")]
    pub ingest_interval_hours: u64,

    #[arg(long, env = "PURGE_INTERVAL_HOURS", default_value = "24")]
    pub purge_interval_hours: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the ingestion and purge schedules until interrupted
    Run,
    /// Run a single ingestion pass and exit
    Ingest,
    /// Purge expired articles and activity once and exit
    Purge,
    /// Print the category catalog
    Categories,
    /// Print a feed as JSON
    Feed {
        #[arg(long, value_parser = parse_mood)]
        mood: Option<Mood>,

        /// Comma separated category names
        #[arg(long, value_delimiter = ',', value_parser = parse_category)]
        categories: Vec<Category>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        user: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Print a user's interest-based feed as JSON
    ForYou {
        #[arg(long)]
        user: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Print articles carrying a mood tag as JSON
    Tagged {
        tag: String,

        #[arg(long, default_value = "15")]
        limit: usize,
    },
}

fn parse_mood(value: &str) -> Result<Mood, String> {
    value.parse().map_err(|e: crate::types::UnknownVariant| e.to_string())
}

fn parse_category(value: &str) -> Result<Category, String> {
    value.parse().map_err(|e: crate::types::UnknownVariant| e.to_string())
}

impl AppConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            article_ttl: chrono::Duration::days(self.article_ttl_days.max(1)),
            activity_ttl: chrono::Duration::days(self.activity_ttl_days.max(1)),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout_seconds: self.providers.timeout_secs.max(1),
            ..FetchConfig::default()
        }
    }

    pub fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            ingest_interval: hours(self.schedule.ingest_interval_hours),
            purge_interval: hours(self.schedule.purge_interval_hours),
            page_size: self.providers.page_size.max(1),
            provider_timeout: Duration::from_secs(self.providers.timeout_secs.max(1)),
            ..ScheduleConfig::default()
        }
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            max_limit: self.feed_max_limit.max(1),
            freshness: chrono::Duration::days(self.freshness_days.max(1)),
            ..FeedConfig::default()
        }
    }

    /// Database URL with the password replaced, for logging.
    pub fn redacted_database_url(&self) -> Option<String> {
        self.database_url.as_deref().map(redact_password)
    }
}

fn hours(count: u64) -> Duration {
    Duration::from_secs(count.max(1) * 60 * 60)
}

/// Replace the password in a connection URL with `***`.
pub fn redact_password(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                "<invalid database url>".to_string()
            }
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid database url>".to_string(),
    }
}
