use chrono::{Duration, TimeZone, Utc};
use news_aggregator::catalog;
use news_aggregator::store::{ArticleFilter, Cursor, PutOutcome};
use news_aggregator::{
    open_store, ActivityAction, AggregatorError, ArticleStore, Category, EnrichedArticle, MemoryStore, Mood,
    Sentiment, StoreBackend, StoreConfig, UserPreference, UserStore,
};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

fn article(id: &str, category: Category, minutes_ago: i64) -> EnrichedArticle {
    EnrichedArticle {
        id: id.to_string(),
        title: format!("Headline {}", id),
        description: "Something happened".to_string(),
        url: format!("https://example.com/{}", id),
        image_url: "https://example.com/image.jpg".to_string(),
        source: "Example".to_string(),
        author: "Unknown".to_string(),
        published_at: Utc::now() - Duration::minutes(minutes_ago),
        category,
        read_time: 1,
        sentiment: Sentiment::Neutral,
        mood_tags: vec!["neutral".to_string()],
        is_healthy_content: true,
    }
}

fn expiring_store() -> MemoryStore {
    MemoryStore::new(StoreConfig {
        article_ttl: Duration::seconds(-1),
        activity_ttl: Duration::seconds(-1),
    })
}

#[tokio::test]
async fn test_put_is_idempotent_by_url() {
    let store = MemoryStore::default();

    let first = article("a1", Category::Technology, 5);
    let mut same_url = article("b1", Category::Science, 3);
    same_url.url = first.url.clone();

    assert_eq!(store.put(first.clone()).await.unwrap(), PutOutcome::Created);
    assert_eq!(store.put(first).await.unwrap(), PutOutcome::Duplicate);
    assert_eq!(store.put(same_url).await.unwrap(), PutOutcome::Duplicate);
    assert_eq!(store.article_count().await, 1);

    let stored = store.get("a1").await.unwrap().unwrap();
    assert_eq!(stored.category, Category::Technology);
    assert!(stored.is_active);
    assert_eq!(stored.view_count, 0);
    assert!(stored.expires_at > stored.created_at);
    assert!(store.get("b1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_store_a_url_once() {
    let store = Arc::new(MemoryStore::default());

    let puts = (0..16).map(|i| {
        let store = store.clone();
        let mut racer = article(&format!("race{}", i), Category::World, i);
        racer.url = "https://example.com/shared".to_string();
        tokio::spawn(async move { store.put(racer).await })
    });
    let outcomes: Vec<PutOutcome> = join_all(puts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let created = outcomes.iter().filter(|o| **o == PutOutcome::Created).count();
    assert_eq!(created, 1);
    assert_eq!(outcomes.len() - created, 15);
    assert_eq!(store.article_count().await, 1);
}

#[tokio::test]
async fn test_category_cursor_pagination() {
    let store = MemoryStore::default();
    for i in 0..5 {
        store
            .put(article(&format!("t{}", i), Category::Technology, i * 10))
            .await
            .unwrap();
    }
    store.put(article("s0", Category::Sports, 1)).await.unwrap();

    let first = store.query_by_category(Category::Technology, 2, None).await.unwrap();
    let second = store
        .query_by_category(Category::Technology, 2, first.next_cursor.as_deref())
        .await
        .unwrap();
    let third = store
        .query_by_category(Category::Technology, 2, second.next_cursor.as_deref())
        .await
        .unwrap();

    assert_eq!(first.articles.len(), 2);
    assert_eq!(second.articles.len(), 2);
    assert_eq!(third.articles.len(), 1);
    assert!(third.next_cursor.is_none());

    let ids: Vec<String> = first
        .articles
        .iter()
        .chain(&second.articles)
        .chain(&third.articles)
        .map(|a| a.id.clone())
        .collect();
    assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 5);
}

#[tokio::test]
async fn test_cursor_breaks_publish_time_ties_by_id() {
    let store = MemoryStore::default();
    let published = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    for id in ["x1", "x2", "x3"] {
        let mut a = article(id, Category::World, 0);
        a.published_at = published;
        store.put(a).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store.query_by_category(Category::World, 1, cursor.as_deref()).await.unwrap();
        seen.extend(page.articles.into_iter().map(|a| a.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(seen, vec!["x3", "x2", "x1"]);
}

#[tokio::test]
async fn test_invalid_cursor_is_rejected() {
    let store = MemoryStore::default();

    let err = store
        .query_by_category(Category::World, 5, Some("definitely not a cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::InvalidCursor));

    let cursor = Cursor {
        published_at: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap() + Duration::nanoseconds(789),
        id: "gnews_abc:def".to_string(),
    };
    assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
}

#[tokio::test]
async fn test_query_by_mood_uses_every_tag() {
    let store = MemoryStore::default();

    let mut calm = article("m1", Category::Lifestyle, 1);
    calm.mood_tags = vec!["positive".to_string(), "calm".to_string()];
    let mut other = article("m2", Category::Health, 2);
    other.mood_tags = vec!["neutral".to_string(), "calm".to_string()];
    store.put(calm).await.unwrap();
    store.put(other).await.unwrap();
    store.put(article("m3", Category::Health, 0)).await.unwrap();

    let found = store.query_by_mood("calm", 10).await.unwrap();
    let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);

    assert_eq!(store.query_by_mood("calm", 1).await.unwrap().len(), 1);
    assert!(store.query_by_mood("nothing", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_query_recent_budgets_categories() {
    let store = MemoryStore::default();
    for i in 0..4 {
        store.put(article(&format!("h{}", i), Category::Health, i * 2)).await.unwrap();
        store.put(article(&format!("f{}", i), Category::Food, i * 2 + 1)).await.unwrap();
    }
    store.put(article("w0", Category::World, 0)).await.unwrap();

    // ceil(5 / 2) = 3 per category, merged and cut to 5
    let recent = store
        .query_recent(5, Some(&[Category::Health, Category::Food][..]))
        .await
        .unwrap();
    let ids: Vec<&str> = recent.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["h0", "f0", "h1", "f1", "h2"]);

    let latest = store.query_recent(2, None).await.unwrap();
    let ids: Vec<&str> = latest.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["w0", "h0"]);

    assert!(store.query_recent(0, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_query_feed_filters_and_counts() {
    let store = MemoryStore::default();
    for i in 0..6 {
        let mut a = article(&format!("p{}", i), Category::Politics, i);
        if i % 2 == 0 {
            a.source = "Daily".to_string();
        }
        store.put(a).await.unwrap();
    }
    let mut old = article("old", Category::Politics, 60 * 24 * 9);
    old.source = "Daily".to_string();
    store.put(old).await.unwrap();
    store.put(article("g0", Category::Gaming, 0)).await.unwrap();

    let filter = ArticleFilter {
        categories: vec![Category::Politics],
        source: Some("Daily".to_string()),
        published_after: Some(Utc::now() - Duration::days(7)),
    };
    let (page, total) = store.query_feed(&filter, 2, 1).await.unwrap();
    assert_eq!(total, 3);
    let ids: Vec<&str> = page.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p4"]);

    let (all, total) = store.query_feed(&ArticleFilter::default(), 50, 0).await.unwrap();
    assert_eq!(total, 8);
    assert_eq!(all.len(), 8);
    assert_eq!(all[0].id, "g0");
}

#[tokio::test]
async fn test_purge_removes_expired_once() {
    let store = expiring_store();
    store.put(article("e1", Category::Travel, 1)).await.unwrap();
    store.put(article("e2", Category::Travel, 2)).await.unwrap();

    // expired articles are invisible before the purge
    assert!(store.query_by_category(Category::Travel, 10, None).await.unwrap().articles.is_empty());
    assert!(store.query_by_mood("neutral", 10).await.unwrap().is_empty());

    assert_eq!(store.purge_expired().await.unwrap(), 2);
    assert_eq!(store.purge_expired().await.unwrap(), 0);
    assert_eq!(store.article_count().await, 0);

    // the URL is free again once purged
    assert_eq!(
        store.put(article("e1", Category::Travel, 1)).await.unwrap(),
        PutOutcome::Created
    );
}

#[tokio::test]
async fn test_purge_keeps_live_articles() {
    let store = MemoryStore::default();
    store.put(article("live", Category::Food, 1)).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 0);
    assert!(store.get("live").await.unwrap().is_some());
}

#[tokio::test]
async fn test_view_count_increments() {
    let store = MemoryStore::default();
    store.put(article("v1", Category::Science, 1)).await.unwrap();

    assert_eq!(store.increment_view_count("v1").await.unwrap(), Some(1));
    assert_eq!(store.increment_view_count("v1").await.unwrap(), Some(2));
    assert_eq!(store.increment_view_count("missing").await.unwrap(), None);
    assert_eq!(store.get("v1").await.unwrap().unwrap().view_count, 2);
}

#[tokio::test]
async fn test_category_catalog() {
    let store = open_store(StoreBackend::Memory, None, StoreConfig::default(), &catalog::default_categories())
        .await
        .unwrap();

    let categories = store.list_categories().await.unwrap();
    assert_eq!(categories.len(), Category::ALL.len());
    assert_eq!(categories[0].name, Category::General);
    assert!(categories.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));

    // seeding again adds nothing
    assert_eq!(store.seed_categories(&catalog::default_categories()).await.unwrap(), 0);

    let mut inactive = catalog::default_categories();
    for c in &mut inactive {
        c.is_active = false;
    }
    let fresh = MemoryStore::default();
    fresh.seed_categories(&inactive).await.unwrap();
    assert!(fresh.list_categories().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_postgres_requires_url() {
    let err = open_store(StoreBackend::Postgres, None, StoreConfig::default(), &[])
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AggregatorError::Config(_)));
}

#[tokio::test]
async fn test_preferences_overwrite() {
    let store = MemoryStore::default();
    assert!(store.get_preferences("u1").await.unwrap().is_none());

    let mut prefs = UserPreference::empty("u1");
    prefs.interests = vec![Category::Health, Category::Food];
    prefs.preferences.insert("health".to_string(), "high".to_string());
    store.save_preferences(prefs.clone()).await.unwrap();
    assert_eq!(store.get_preferences("u1").await.unwrap(), Some(prefs));

    let replacement = UserPreference {
        setup_complete: true,
        ..UserPreference::empty("u1")
    };
    store.save_preferences(replacement.clone()).await.unwrap();
    assert_eq!(store.get_preferences("u1").await.unwrap(), Some(replacement));
}

#[tokio::test]
async fn test_bookmarks() {
    let store = MemoryStore::default();

    let first = store.add_bookmark("u1", "a1").await.unwrap();
    let again = store.add_bookmark("u1", "a1").await.unwrap();
    assert_eq!(first.bookmarked_at, again.bookmarked_at);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.add_bookmark("u1", "a2").await.unwrap();
    store.add_bookmark("u2", "a1").await.unwrap();

    let listed: Vec<String> = store
        .list_bookmarks("u1", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.article_id)
        .collect();
    assert_eq!(listed, vec!["a2", "a1"]);

    let ids = store
        .bookmarked_ids("u1", &["a1".to_string(), "a3".to_string()])
        .await
        .unwrap();
    assert_eq!(ids, HashSet::from(["a1".to_string()]));

    assert!(store.remove_bookmark("u1", "a1").await.unwrap());
    assert!(!store.remove_bookmark("u1", "a1").await.unwrap());
    assert_eq!(store.list_bookmarks("u1", 10).await.unwrap().len(), 1);
    assert_eq!(store.list_bookmarks("u2", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_activity_log_and_purge() {
    let store = MemoryStore::default();
    store
        .record_activity("u1", "a1", ActivityAction::View, Some(Mood::Happy))
        .await
        .unwrap();
    store
        .record_activity("u1", "a1", ActivityAction::ReadComplete, None)
        .await
        .unwrap();
    store.record_activity("u2", "a1", ActivityAction::Like, None).await.unwrap();

    let events = store.list_activity("u1", 10).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, ActivityAction::ReadComplete);
    assert_eq!(events[1].mood, Some(Mood::Happy));
    assert_eq!(events[1].expires_at - events[1].occurred_at, Duration::days(90));
    assert_eq!(store.purge_expired_activity().await.unwrap(), 0);

    let expiring = expiring_store();
    expiring.record_activity("u1", "a1", ActivityAction::Share, None).await.unwrap();
    assert_eq!(expiring.purge_expired_activity().await.unwrap(), 1);
    assert_eq!(expiring.purge_expired_activity().await.unwrap(), 0);
    assert!(expiring.list_activity("u1", 10).await.unwrap().is_empty());
}
