use news_aggregator::{
    AggregatorError, ArticleStore, Category, FetchConfig, Fetcher, GNewsSource, IngestionScheduler, MemoryStore,
    NewsApiSource, NewsProvider, NewsStore, RunOutcome, ScheduleConfig,
};
use serde_json::json;
use std::sync::{Arc, Once};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

fn fetcher(max_retries: u32) -> Arc<Fetcher> {
    Arc::new(
        Fetcher::new(FetchConfig {
            timeout_seconds: 5,
            max_retries,
            retry_delay_seconds: 1,
            min_host_interval_ms: 0,
            ..FetchConfig::default()
        })
        .unwrap(),
    )
}

fn base(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

fn newsapi_body() -> serde_json::Value {
    json!({
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": {"id": "wire", "name": "The Wire"},
                "author": "A. Writer",
                "title": "Robots learn to cook",
                "description": "A kitchen breakthrough",
                "url": "https://wire.example.com/robots",
                "urlToImage": "https://wire.example.com/robots.jpg",
                "publishedAt": "2024-06-01T08:30:00Z",
                "content": "Full story"
            },
            {
                "source": {"id": null, "name": "Other"},
                "author": null,
                "title": "Chips get faster",
                "description": null,
                "url": "https://other.example.com/chips",
                "urlToImage": null,
                "publishedAt": "2024-06-01T07:00:00Z",
                "content": null
            }
        ]
    })
}

#[tokio::test]
async fn test_newsapi_top_headlines() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .and(query_param("category", "technology"))
        .and(query_param("country", "us"))
        .and(query_param("pageSize", "5"))
        .and(query_param("apiKey", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(newsapi_body()))
        .expect(1)
        .mount(&server)
        .await;

    let source = NewsApiSource::new(fetcher(0), base(&server), Some("secret".to_string()));
    assert!(source.is_configured());
    assert_eq!(source.provider_id(), "newsapi");

    let articles = source.top_headlines(Category::Technology, 5).await.unwrap();
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].provider, "newsapi");
    assert_eq!(articles[0].source_name.as_deref(), Some("The Wire"));
    assert_eq!(articles[0].author.as_deref(), Some("A. Writer"));
    assert_eq!(articles[1].description, None);
}

#[tokio::test]
async fn test_provider_category_mapping() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .and(query_param("category", "general"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "articles": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/top-headlines"))
        .and(query_param("category", "nation"))
        .and(query_param("lang", "en"))
        .and(query_param("max", "3"))
        .and(query_param("apikey", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"totalArticles": 0, "articles": []})))
        .expect(1)
        .mount(&server)
        .await;

    let newsapi = NewsApiSource::new(fetcher(0), base(&server), Some("k".to_string()));
    assert!(newsapi.top_headlines(Category::Politics, 10).await.unwrap().is_empty());

    let gnews = GNewsSource::new(fetcher(0), base(&server), Some("g-key".to_string()));
    assert!(gnews.top_headlines(Category::Politics, 3).await.unwrap().is_empty());

    assert_eq!(NewsApiSource::provider_category(Category::Gaming), "technology");
    assert_eq!(NewsApiSource::provider_category(Category::Environment), "science");
    assert_eq!(NewsApiSource::provider_category(Category::Travel), "general");
    assert_eq!(GNewsSource::provider_category(Category::Finance), "business");
    assert_eq!(GNewsSource::provider_category(Category::Food), "general");
}

#[tokio::test]
async fn test_missing_key_disables_provider() {
    init_tracing();
    let server = MockServer::start().await;

    let newsapi = NewsApiSource::new(fetcher(0), base(&server), Some("  ".to_string()));
    let gnews = GNewsSource::new(fetcher(0), base(&server), None);
    assert!(!newsapi.is_configured());
    assert!(!gnews.is_configured());

    assert!(newsapi.top_headlines(Category::World, 10).await.unwrap().is_empty());
    assert!(gnews.top_headlines(Category::World, 10).await.unwrap().is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_connection_errors_hide_api_key() {
    init_tracing();
    let newsapi = NewsApiSource::new(
        fetcher(0),
        Url::parse("http://127.0.0.1:1").unwrap(),
        Some("SECRETKEY123".to_string()),
    );
    let err = newsapi.top_headlines(Category::Technology, 5).await.unwrap_err();

    assert!(matches!(err, AggregatorError::Http(_)));
    assert!(!err.to_string().contains("SECRETKEY123"));
    assert!(!format!("{:?}", err).contains("SECRETKEY123"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/top-headlines"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let gnews = GNewsSource::new(fetcher(2), base(&server), Some("bad".to_string()));
    let err = gnews.top_headlines(Category::Sports, 10).await.unwrap_err();
    match err {
        AggregatorError::ProviderUnavailable { provider, reason } => {
            assert_eq!(provider, "gnews");
            assert!(reason.contains("401"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(newsapi_body()))
        .expect(1)
        .mount(&server)
        .await;

    let newsapi = NewsApiSource::new(fetcher(1), base(&server), Some("k".to_string()));
    let articles = newsapi.top_headlines(Category::Business, 10).await.unwrap();
    assert_eq!(articles.len(), 2);
}

#[tokio::test]
async fn test_ingestion_against_mock_providers() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(newsapi_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/top-headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalArticles": 2,
            "articles": [
                {
                    "title": "Robots learn to cook (again)",
                    "description": "Same link, different provider",
                    "content": null,
                    "url": "https://wire.example.com/robots",
                    "image": null,
                    "publishedAt": "2024-06-01T09:00:00Z",
                    "source": {"name": "Mirror", "url": "https://mirror.example.com"}
                },
                {
                    "title": "Placeholder pictures everywhere",
                    "description": "An image with a placeholder",
                    "content": null,
                    "url": "https://mirror.example.com/images",
                    "image": "https://mirror.example.com/placeholder.png",
                    "publishedAt": "2024-06-01T09:30:00Z",
                    "source": {"name": "Mirror", "url": "https://mirror.example.com"}
                }
            ]
        })))
        .mount(&server)
        .await;

    let store: Arc<dyn NewsStore> = Arc::new(MemoryStore::default());
    let shared = fetcher(0);
    let scheduler = IngestionScheduler::builder(store.clone())
        .provider(Arc::new(NewsApiSource::new(
            shared.clone(),
            base(&server),
            Some("k".to_string()),
        )))
        .provider(Arc::new(GNewsSource::new(shared, base(&server), Some("g".to_string()))))
        .config(ScheduleConfig {
            categories: vec![Category::Technology],
            provider_timeout: Duration::from_secs(5),
            ..ScheduleConfig::default()
        })
        .build();

    let report = match scheduler.run_once().await.unwrap() {
        RunOutcome::Completed(report) => report,
        RunOutcome::Skipped => panic!("run was skipped"),
    };
    let tech = report.for_category(Category::Technology).unwrap();
    assert_eq!(tech.fetched, 4);
    assert_eq!(tech.unique, 3);
    assert_eq!(tech.stored, 3);

    let page = store.query_by_category(Category::Technology, 10, None).await.unwrap();
    let robots = page
        .articles
        .iter()
        .find(|a| a.url == "https://wire.example.com/robots")
        .unwrap();
    assert!(robots.id.starts_with("newsapi_"));
    assert_eq!(robots.source, "The Wire");

    let images = page
        .articles
        .iter()
        .find(|a| a.url == "https://mirror.example.com/images")
        .unwrap();
    assert!(images.image_url.contains("images.unsplash.com"));
    assert_eq!(images.author, "Unknown");
}

#[tokio::test]
async fn test_locale_is_sent() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .and(query_param("country", "gb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "articles": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/top-headlines"))
        .and(query_param("lang", "de"))
        .and(query_param("country", "at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"articles": []})))
        .expect(1)
        .mount(&server)
        .await;

    let newsapi = NewsApiSource::new(fetcher(0), base(&server), Some("k".to_string())).with_country("gb");
    let gnews = GNewsSource::new(fetcher(0), base(&server), Some("g".to_string())).with_locale("de", "at");

    assert!(newsapi.top_headlines(Category::Health, 5).await.unwrap().is_empty());
    assert!(gnews.top_headlines(Category::Health, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_newsapi_error_status_in_body() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/top-headlines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "code": "rateLimited",
            "message": "You have made too many requests recently."
        })))
        .mount(&server)
        .await;

    let newsapi = NewsApiSource::new(fetcher(0), base(&server), Some("k".to_string()));
    let err = newsapi.top_headlines(Category::World, 5).await.unwrap_err();
    assert!(matches!(err, AggregatorError::ProviderUnavailable { .. }));
    assert!(err.to_string().contains("too many requests"));
}
