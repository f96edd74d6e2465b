// Use the interfaces crate for the shared domain vocabulary
pub use interfaces::defs::{
    ActivityAction, ActivityEvent, Article, Bookmark, Category, CategoryInfo, EnrichedArticle, Mood, RawArticle,
    Sentiment, UnknownVariant, UserPreference,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_response_size_mb: usize,
    pub max_redirects: usize,
    /// Minimum spacing between two requests to the same host.
    pub min_host_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "News-Aggregator/1.0".to_string(),
            timeout_seconds: 10,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_response_size_mb: 5,
            max_redirects: 5,
            min_host_interval_ms: 1000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid pagination cursor")]
    InvalidCursor,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AggregatorError {
    /// Whether the caller may try the same operation again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            AggregatorError::StoreUnavailable(_) | AggregatorError::ProviderUnavailable { .. } => true,
            AggregatorError::Http(e) => e.is_timeout() || e.is_connect(),
            AggregatorError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AggregatorError::NotFound { kind, id: id.into() }
    }
}

impl From<UnknownVariant> for AggregatorError {
    fn from(e: UnknownVariant) -> Self {
        AggregatorError::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
