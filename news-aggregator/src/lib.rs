pub mod types;
pub mod news_utils;
pub mod catalog;
pub mod enrichment;
pub mod parser;
pub mod fetcher;
pub mod traits;
pub mod sources;
pub mod store;
pub mod resolver;
pub mod composer;
pub mod scheduler;
pub mod config;

pub use types::*;
pub use enrichment::{ContentEnricher, EnrichmentRules};
pub use fetcher::Fetcher;
pub use traits::NewsProvider;
pub use sources::{GNewsSource, NewsApiSource};
pub use store::{open_store, ArticleStore, MemoryStore, NewsStore, PgStore, StoreBackend, StoreConfig, UserStore};
pub use resolver::MoodTable;
pub use composer::{FeedComposer, FeedConfig, FeedRequest, FeedResponse, PersonalizedFeed, SafetyPolicy};
pub use scheduler::{IngestReport, IngestionScheduler, RunOutcome, ScheduleConfig};
pub use config::AppConfig;
