use crate::enrichment::ContentEnricher;
use crate::news_utils::time::{format_duration, from_std};
use crate::parser;
use crate::store::{NewsStore, PutOutcome};
use crate::traits::NewsProvider;
use crate::types::{Category, RawArticle, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub ingest_interval: Duration,
    pub purge_interval: Duration,
    /// Categories fetched on every run, in order
    pub categories: Vec<Category>,
    /// Articles requested per provider and category
    pub page_size: u32,
    /// After this a provider's contribution to a category counts as empty
    pub provider_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ingest_interval: Duration::from_secs(2 * 60 * 60),
            purge_interval: Duration::from_secs(24 * 60 * 60),
            categories: Category::ALL.to_vec(),
            page_size: 10,
            provider_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: Option<Category>,
    /// Raw articles returned by all providers together
    pub fetched: usize,
    /// Left after URL deduplication
    pub unique: usize,
    pub stored: usize,
    /// Already in the store
    pub duplicates: usize,
    /// Dropped by the enricher (no title or URL)
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: Vec<CategoryReport>,
}

impl IngestReport {
    pub fn total_fetched(&self) -> usize {
        self.categories.iter().map(|c| c.fetched).sum()
    }

    pub fn total_stored(&self) -> usize {
        self.categories.iter().map(|c| c.stored).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.categories.iter().map(|c| c.duplicates).sum()
    }

    pub fn for_category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == Some(category))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(IngestReport),
    /// Another run was still in progress
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub articles: u64,
    pub activity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: RunState,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_result: Option<RunResult>,
    pub last_report: Option<IngestReport>,
    pub next_ingest_at: Option<DateTime<Utc>>,
    pub last_purge_at: Option<DateTime<Utc>>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            last_started_at: None,
            last_finished_at: None,
            last_result: None,
            last_report: None,
            next_ingest_at: None,
            last_purge_at: None,
        }
    }
}

/// Clears the single-flight flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic fetch, dedupe, enrich and store, plus a separately timed purge.
pub struct IngestionScheduler {
    providers: Vec<Arc<dyn NewsProvider>>,
    enricher: ContentEnricher,
    store: Arc<dyn NewsStore>,
    config: ScheduleConfig,
    running: AtomicBool,
    status: RwLock<SchedulerStatus>,
}

impl IngestionScheduler {
    pub fn new(store: Arc<dyn NewsStore>, config: ScheduleConfig) -> Self {
        Self {
            providers: Vec::new(),
            enricher: ContentEnricher::default(),
            store,
            config,
            running: AtomicBool::new(false),
            status: RwLock::new(SchedulerStatus::default()),
        }
    }

    pub fn builder(store: Arc<dyn NewsStore>) -> SchedulerBuilder {
        SchedulerBuilder::new(store)
    }

    pub fn add_provider(&mut self, provider: Arc<dyn NewsProvider>) {
        info!("Adding provider to scheduler: {}", provider.provider_name());
        self.providers.push(provider);
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    /// Run one ingestion pass over every configured category.
    ///
    /// Returns [`RunOutcome::Skipped`] without doing anything if a pass is
    /// already in progress. Provider failures only shrink the report; a
    /// store failure ends the run with an error.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Ingestion already running, skipping this run");
            return Ok(RunOutcome::Skipped);
        }
        let _guard = RunGuard(&self.running);

        let started_at = Utc::now();
        {
            let mut status = self.status.write().await;
            status.state = RunState::Running;
            status.last_started_at = Some(started_at);
        }
        info!(
            "Starting ingestion run: {} categories, {} providers",
            self.config.categories.len(),
            self.providers.len()
        );

        let result = self.ingest_all(started_at).await;
        let finished_at = Utc::now();

        let mut status = self.status.write().await;
        status.state = RunState::Idle;
        status.last_finished_at = Some(finished_at);

        match result {
            Ok(categories) => {
                let report = IngestReport {
                    started_at,
                    finished_at,
                    categories,
                };
                info!(
                    "Ingestion run finished in {}: {} fetched, {} stored, {} duplicates",
                    format_duration(finished_at - started_at),
                    report.total_fetched(),
                    report.total_stored(),
                    report.total_duplicates()
                );
                status.last_result = Some(RunResult::Succeeded);
                status.last_report = Some(report.clone());
                Ok(RunOutcome::Completed(report))
            }
            Err(e) => {
                error!("Ingestion run failed: {}", e);
                status.last_result = Some(RunResult::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn ingest_all(&self, ingested_at: DateTime<Utc>) -> Result<Vec<CategoryReport>> {
        let mut reports = Vec::with_capacity(self.config.categories.len());
        for category in &self.config.categories {
            reports.push(self.ingest_category(*category, ingested_at).await?);
        }
        Ok(reports)
    }

    async fn ingest_category(&self, category: Category, ingested_at: DateTime<Utc>) -> Result<CategoryReport> {
        let fetches = self.providers.iter().map(|provider| self.fetch_provider(provider.as_ref(), category));
        let raw: Vec<RawArticle> = join_all(fetches).await.into_iter().flatten().collect();

        let mut report = CategoryReport {
            category: Some(category),
            fetched: raw.len(),
            ..Default::default()
        };

        let unique = parser::dedupe_by_url(raw);
        report.unique = unique.len();

        for article in &unique {
            let Some(enriched) = self.enricher.enrich(article, category, ingested_at) else {
                report.skipped += 1;
                continue;
            };
            match self.store.put(enriched).await? {
                PutOutcome::Created => report.stored += 1,
                PutOutcome::Duplicate => report.duplicates += 1,
            }
        }

        debug!(
            "{}: fetched {}, unique {}, stored {}, duplicates {}",
            category, report.fetched, report.unique, report.stored, report.duplicates
        );
        Ok(report)
    }

    /// A provider that fails or times out contributes nothing.
    async fn fetch_provider(&self, provider: &dyn NewsProvider, category: Category) -> Vec<RawArticle> {
        if !provider.is_configured() {
            debug!("Provider {} not configured, skipping", provider.provider_id());
            return Vec::new();
        }

        let fetch = provider.top_headlines(category, self.config.page_size);
        match tokio::time::timeout(self.config.provider_timeout, fetch).await {
            Ok(Ok(articles)) => {
                debug!("{} returned {} articles for {}", provider.provider_id(), articles.len(), category);
                articles
            }
            Ok(Err(e)) => {
                warn!("Provider {} failed for {}: {}", provider.provider_id(), category, e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Provider {} timed out for {} after {:?}",
                    provider.provider_id(),
                    category,
                    self.config.provider_timeout
                );
                Vec::new()
            }
        }
    }

    /// Remove expired articles and activity events.
    pub async fn purge_once(&self) -> Result<PurgeReport> {
        let articles = self.store.purge_expired().await?;
        let activity = self.store.purge_expired_activity().await?;

        self.status.write().await.last_purge_at = Some(Utc::now());
        info!("Purge finished: {} articles, {} activity events removed", articles, activity);
        Ok(PurgeReport { articles, activity })
    }

    /// Spawn the ingestion and purge loops. Ingestion runs once right away.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        info!(
            "Starting scheduler: ingest every {}, purge every {}",
            format_duration(from_std(self.config.ingest_interval)),
            format_duration(from_std(self.config.purge_interval))
        );

        let scheduler = self.clone();
        let ingest = tokio::spawn(async move {
            let mut ticker = interval(scheduler.config.ingest_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.run_once().await {
                    error!("Scheduled ingestion failed: {}", e);
                }
                let next = Utc::now() + from_std(scheduler.config.ingest_interval);
                scheduler.status.write().await.next_ingest_at = Some(next);
            }
        });

        let scheduler = self;
        let purge = tokio::spawn(async move {
            let period = scheduler.config.purge_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.purge_once().await {
                    error!("Scheduled purge failed: {}", e);
                }
            }
        });

        SchedulerHandle { ingest, purge }
    }
}

/// Background tasks started by [`IngestionScheduler::start`].
pub struct SchedulerHandle {
    ingest: JoinHandle<()>,
    purge: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn shutdown(self) {
        info!("Stopping scheduler");
        self.ingest.abort();
        self.purge.abort();
    }
}

/// Builder for wiring providers and rules into a scheduler
pub struct SchedulerBuilder {
    store: Arc<dyn NewsStore>,
    providers: Vec<Arc<dyn NewsProvider>>,
    enricher: ContentEnricher,
    config: ScheduleConfig,
}

impl SchedulerBuilder {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self {
            store,
            providers: Vec::new(),
            enricher: ContentEnricher::default(),
            config: ScheduleConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn NewsProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn enricher(mut self, enricher: ContentEnricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn config(mut self, config: ScheduleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> IngestionScheduler {
        let mut scheduler = IngestionScheduler::new(self.store, self.config);
        scheduler.enricher = self.enricher;
        for provider in self.providers {
            scheduler.add_provider(provider);
        }
        scheduler
    }
}
