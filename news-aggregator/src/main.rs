use anyhow::Context;
use clap::Parser;
use news_aggregator::config::{AppConfig, Command};
use news_aggregator::{
    catalog, open_store, FeedComposer, FeedRequest, Fetcher, GNewsSource, IngestionScheduler, NewsApiSource,
    NewsStore, RunOutcome,
};
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::parse();
    info!("Starting news aggregator ({:?} store)", config.store);
    if let Some(url) = config.redacted_database_url() {
        info!("Database: {}", url);
    }

    let store = open_store(
        config.store,
        config.database_url.as_deref(),
        config.store_config(),
        &catalog::default_categories(),
    )
    .await
    .map_err(|e| {
        error!("Failed to open store. For postgres, check DATABASE_URL and that the server is running");
        e
    })?;

    match config.command.clone() {
        Command::Run => run(&config, store).await,
        Command::Ingest => {
            let scheduler = build_scheduler(&config, store)?;
            match scheduler.run_once().await? {
                RunOutcome::Completed(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                RunOutcome::Skipped => info!("Ingestion skipped"),
            }
            Ok(())
        }
        Command::Purge => {
            let scheduler = build_scheduler(&config, store)?;
            let report = scheduler.purge_once().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Categories => {
            let composer = FeedComposer::new(store).with_config(config.feed_config());
            for category in composer.get_categories().await? {
                println!("{} {:<14} {}", category.icon, category.name.as_str(), category.display_name);
            }
            Ok(())
        }
        Command::Feed {
            mood,
            categories,
            source,
            user,
            limit,
            offset,
        } => {
            let composer = FeedComposer::new(store).with_config(config.feed_config());
            let request = FeedRequest {
                mood,
                categories: (!categories.is_empty()).then_some(categories),
                source,
                limit,
                offset,
                user_id: user,
            };
            let feed = composer.get_feed(request).await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
            Ok(())
        }
        Command::ForYou { user, limit } => {
            let composer = FeedComposer::new(store).with_config(config.feed_config());
            let feed = composer.get_personalized_feed(&user, limit).await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
            Ok(())
        }
        Command::Tagged { tag, limit } => {
            let composer = FeedComposer::new(store).with_config(config.feed_config());
            let articles = composer.get_articles_by_mood_tag(&tag, limit).await?;
            println!("{}", serde_json::to_string_pretty(&articles)?);
            Ok(())
        }
    }
}

fn build_scheduler(config: &AppConfig, store: Arc<dyn NewsStore>) -> anyhow::Result<IngestionScheduler> {
    let fetcher = Arc::new(Fetcher::new(config.fetch_config())?);
    let providers = &config.providers;

    let newsapi_base = Url::parse(&providers.newsapi_base_url).context("invalid NEWSAPI_BASE_URL")?;
    let gnews_base = Url::parse(&providers.gnews_base_url).context("invalid GNEWS_BASE_URL")?;

    let scheduler = IngestionScheduler::builder(store)
        .provider(Arc::new(
            NewsApiSource::new(fetcher.clone(), newsapi_base, providers.news_api_key.clone())
                .with_country(&providers.country),
        ))
        .provider(Arc::new(
            GNewsSource::new(fetcher, gnews_base, providers.gnews_api_key.clone())
                .with_locale(&providers.lang, &providers.country),
        ))
        .config(config.schedule_config())
        .build();
    Ok(scheduler)
}

async fn run(config: &AppConfig, store: Arc<dyn NewsStore>) -> anyhow::Result<()> {
    let scheduler = Arc::new(build_scheduler(config, store)?);
    let handle = scheduler.clone().start();

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    handle.shutdown();

    let status = scheduler.status().await;
    info!("Last run: {:?} at {:?}", status.last_result, status.last_finished_at);
    Ok(())
}
