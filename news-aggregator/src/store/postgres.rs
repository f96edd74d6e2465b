use super::{ArticleFilter, ArticlePage, ArticleStore, Cursor, PutOutcome, StoreConfig, UserStore};
use crate::types::{
    ActivityAction, ActivityEvent, Article, Bookmark, Category, CategoryInfo, EnrichedArticle, Mood, Result,
    UnknownVariant, UserPreference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const ARTICLE_COLUMNS: &str = "id, title, description, url, image_url, source, author, published_at, category, \
     read_time, sentiment, mood_tags, is_healthy_content, is_active, view_count, created_at, expires_at";

/// PostgreSQL adapter. Queries are built at runtime so the crate compiles
/// without a live database.
pub struct PgStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PgStore {
    pub async fn connect(database_url: &str, config: StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::with_pool(pool, config))
    }

    pub fn with_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    pub async fn setup_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS news_categories (
                name VARCHAR(64) PRIMARY KEY,
                display_name VARCHAR(128) NOT NULL,
                description TEXT NOT NULL,
                icon VARCHAR(32) NOT NULL,
                color VARCHAR(16) NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                sort_order INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS news_articles (
                id VARCHAR(128) PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                image_url TEXT NOT NULL,
                source VARCHAR(255) NOT NULL,
                author VARCHAR(255) NOT NULL,
                published_at TIMESTAMP WITH TIME ZONE NOT NULL,
                category VARCHAR(64) NOT NULL,
                read_time INTEGER NOT NULL,
                sentiment VARCHAR(16) NOT NULL,
                mood_tags TEXT[] NOT NULL DEFAULT '{}',
                is_healthy_content BOOLEAN NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                view_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMP WITH TIME ZONE NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS news_articles_category_idx ON news_articles (category, published_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS news_articles_published_idx ON news_articles (published_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS news_articles_mood_idx ON news_articles USING GIN (mood_tags)",
            "CREATE INDEX IF NOT EXISTS news_articles_expires_idx ON news_articles (expires_at)",
            r#"
            CREATE TABLE IF NOT EXISTS user_news_preferences (
                user_id VARCHAR(255) PRIMARY KEY,
                interests TEXT[] NOT NULL DEFAULT '{}',
                setup_complete BOOLEAN NOT NULL DEFAULT FALSE,
                preferences JSONB NOT NULL DEFAULT '{}',
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_bookmarks (
                user_id VARCHAR(255) NOT NULL,
                article_id VARCHAR(128) NOT NULL,
                bookmarked_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                PRIMARY KEY (user_id, article_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_news_activity (
                seq BIGSERIAL PRIMARY KEY,
                user_id VARCHAR(255) NOT NULL,
                article_id VARCHAR(128) NOT NULL,
                action VARCHAR(32) NOT NULL,
                mood VARCHAR(32),
                occurred_at TIMESTAMP WITH TIME ZONE NOT NULL,
                expires_at TIMESTAMP WITH TIME ZONE NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS user_news_activity_user_idx ON user_news_activity (user_id, occurred_at DESC)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    async fn fetch_articles<'q>(&self, sql: &'q str, binds: ArticleBinds<'q>) -> Result<Vec<Article>> {
        let mut query = sqlx::query(sql);
        for bind in binds.0 {
            query = match bind {
                Bind::Text(v) => query.bind(v),
                Bind::OptText(v) => query.bind(v),
                Bind::Time(v) => query.bind(v),
                Bind::OptTime(v) => query.bind(v),
                Bind::Int(v) => query.bind(v),
                Bind::TextArray(v) => query.bind(v),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(article_from_row).map(|r| r.map_err(Into::into)).collect()
    }
}

/// Positional parameters for the article queries, in `$n` order.
struct ArticleBinds<'a>(Vec<Bind<'a>>);

enum Bind<'a> {
    Text(&'a str),
    OptText(Option<&'a str>),
    Time(DateTime<Utc>),
    OptTime(Option<DateTime<Utc>>),
    Int(i64),
    TextArray(Vec<String>),
}

/// LIMIT and OFFSET are BIGINT; larger counts saturate.
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn parse_column<T>(row: &PgRow, column: &str) -> std::result::Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: UnknownVariant| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn article_from_row(row: &PgRow) -> std::result::Result<Article, sqlx::Error> {
    let read_time: i32 = row.try_get("read_time")?;
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        image_url: row.try_get("image_url")?,
        source: row.try_get("source")?,
        author: row.try_get("author")?,
        published_at: row.try_get("published_at")?,
        category: parse_column(row, "category")?,
        read_time: read_time.max(0) as u32,
        sentiment: parse_column(row, "sentiment")?,
        mood_tags: row.try_get("mood_tags")?,
        is_healthy_content: row.try_get("is_healthy_content")?,
        is_active: row.try_get("is_active")?,
        view_count: row.try_get("view_count")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn category_from_row(row: &PgRow) -> std::result::Result<CategoryInfo, sqlx::Error> {
    Ok(CategoryInfo {
        name: parse_column(row, "name")?,
        display_name: row.try_get("display_name")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        color: row.try_get("color")?,
        is_active: row.try_get("is_active")?,
        sort_order: row.try_get("sort_order")?,
    })
}

fn activity_from_row(row: &PgRow) -> std::result::Result<ActivityEvent, sqlx::Error> {
    let mood: Option<String> = row.try_get("mood")?;
    let mood = mood
        .map(|m| m.parse::<Mood>())
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "mood".to_string(),
            source: Box::new(e),
        })?;

    Ok(ActivityEvent {
        user_id: row.try_get("user_id")?,
        article_id: row.try_get("article_id")?,
        action: parse_column::<ActivityAction>(row, "action")?,
        mood,
        occurred_at: row.try_get("occurred_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn put(&self, article: EnrichedArticle) -> Result<PutOutcome> {
        let now = Utc::now();
        let expires_at = now + self.config.article_ttl;

        let result = sqlx::query(
            r#"
            INSERT INTO news_articles (
                id, title, description, url, image_url, source, author, published_at, category,
                read_time, sentiment, mood_tags, is_healthy_content, is_active, view_count, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, TRUE, 0, $14, $15)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.url)
        .bind(&article.image_url)
        .bind(&article.source)
        .bind(&article.author)
        .bind(article.published_at)
        .bind(article.category.as_str())
        .bind(article.read_time as i32)
        .bind(article.sentiment.as_str())
        .bind(&article.mood_tags)
        .bind(article.is_healthy_content)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Skipping already stored article: {}", article.url);
            Ok(PutOutcome::Duplicate)
        } else {
            Ok(PutOutcome::Created)
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM news_articles WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(article_from_row).transpose()?)
    }

    async fn query_by_category(&self, category: Category, limit: usize, cursor: Option<&str>) -> Result<ArticlePage> {
        let cursor = cursor.map(Cursor::decode).transpose()?;
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM news_articles \
             WHERE category = $1 AND is_active AND expires_at > $2 \
               AND ($3::timestamptz IS NULL OR (published_at, id) < ($3, $4)) \
             ORDER BY published_at DESC, id DESC LIMIT $5"
        );

        let (after_time, after_id) = match &cursor {
            Some(c) => (Some(c.published_at), Some(c.id.as_str())),
            None => (None, None),
        };
        let articles = self
            .fetch_articles(
                &sql,
                ArticleBinds(vec![
                    Bind::Text(category.as_str()),
                    Bind::Time(Utc::now()),
                    Bind::OptTime(after_time),
                    Bind::OptText(after_id),
                    Bind::Int(sql_count(limit).saturating_add(1)),
                ]),
            )
            .await?;

        Ok(ArticlePage::from_overfetch(articles, limit))
    }

    async fn query_by_mood(&self, mood_tag: &str, limit: usize) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM news_articles \
             WHERE $1 = ANY(mood_tags) AND is_active AND expires_at > $2 \
             ORDER BY published_at DESC, id DESC LIMIT $3"
        );
        self.fetch_articles(
            &sql,
            ArticleBinds(vec![Bind::Text(mood_tag), Bind::Time(Utc::now()), Bind::Int(sql_count(limit))]),
        )
        .await
    }

    async fn query_latest(&self, limit: usize) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM news_articles \
             WHERE is_active AND expires_at > $1 \
             ORDER BY published_at DESC, id DESC LIMIT $2"
        );
        self.fetch_articles(&sql, ArticleBinds(vec![Bind::Time(Utc::now()), Bind::Int(sql_count(limit))]))
            .await
    }

    async fn query_feed(&self, filter: &ArticleFilter, limit: usize, offset: usize) -> Result<(Vec<Article>, u64)> {
        const WHERE: &str = "WHERE is_active AND expires_at > $1 \
               AND (cardinality($2::text[]) = 0 OR category = ANY($2)) \
               AND ($3::text IS NULL OR source = $3) \
               AND ($4::timestamptz IS NULL OR published_at >= $4)";

        let now = Utc::now();
        let categories: Vec<String> = filter.categories.iter().map(|c| c.as_str().to_string()).collect();

        let count_sql = format!("SELECT COUNT(*) AS count FROM news_articles {WHERE}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(now)
            .bind(&categories)
            .bind(filter.source.as_deref())
            .bind(filter.published_after)
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM news_articles {WHERE} \
             ORDER BY published_at DESC, id DESC LIMIT $5 OFFSET $6"
        );
        let articles = self
            .fetch_articles(
                &sql,
                ArticleBinds(vec![
                    Bind::Time(now),
                    Bind::TextArray(categories),
                    Bind::OptText(filter.source.as_deref()),
                    Bind::OptTime(filter.published_after),
                    Bind::Int(sql_count(limit)),
                    Bind::Int(sql_count(offset)),
                ]),
            )
            .await?;

        Ok((articles, total.max(0) as u64))
    }

    async fn increment_view_count(&self, id: &str) -> Result<Option<i64>> {
        let row = sqlx::query("UPDATE news_articles SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get("view_count")).transpose()?)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM news_articles WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            info!("Purged {} expired articles", removed);
        }
        Ok(removed)
    }

    async fn seed_categories(&self, categories: &[CategoryInfo]) -> Result<usize> {
        let mut added = 0;
        for category in categories {
            let result = sqlx::query(
                r#"
                INSERT INTO news_categories (name, display_name, description, icon, color, is_active, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(category.name.as_str())
            .bind(&category.display_name)
            .bind(&category.description)
            .bind(&category.icon)
            .bind(&category.color)
            .bind(category.is_active)
            .bind(category.sort_order)
            .execute(&self.pool)
            .await?;
            added += result.rows_affected() as usize;
        }
        Ok(added)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>> {
        let rows = sqlx::query(
            "SELECT name, display_name, description, icon, color, is_active, sort_order \
             FROM news_categories WHERE is_active ORDER BY sort_order, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(category_from_row).collect::<std::result::Result<_, _>>()?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn save_preferences(&self, preference: UserPreference) -> Result<()> {
        let interests: Vec<String> = preference.interests.iter().map(|c| c.as_str().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO user_news_preferences (user_id, interests, setup_complete, preferences, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                interests = EXCLUDED.interests,
                setup_complete = EXCLUDED.setup_complete,
                preferences = EXCLUDED.preferences,
                updated_at = NOW()
            "#,
        )
        .bind(&preference.user_id)
        .bind(&interests)
        .bind(preference.setup_complete)
        .bind(Json(&preference.preferences))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreference>> {
        let row = sqlx::query(
            "SELECT user_id, interests, setup_complete, preferences FROM user_news_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let interests: Vec<String> = row.try_get("interests")?;
        let interests = interests
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let Json(preferences): Json<BTreeMap<String, String>> = row.try_get("preferences")?;

        Ok(Some(UserPreference {
            user_id: row.try_get("user_id")?,
            interests,
            setup_complete: row.try_get("setup_complete")?,
            preferences,
        }))
    }

    async fn add_bookmark(&self, user_id: &str, article_id: &str) -> Result<Bookmark> {
        sqlx::query(
            r#"
            INSERT INTO user_bookmarks (user_id, article_id, bookmarked_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, article_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT bookmarked_at FROM user_bookmarks WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Bookmark {
            user_id: user_id.to_string(),
            article_id: article_id.to_string(),
            bookmarked_at: row.try_get("bookmarked_at")?,
        })
    }

    async fn remove_bookmark(&self, user_id: &str, article_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_bookmarks WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_bookmarks(&self, user_id: &str, limit: usize) -> Result<Vec<Bookmark>> {
        let rows = sqlx::query(
            "SELECT user_id, article_id, bookmarked_at FROM user_bookmarks \
             WHERE user_id = $1 ORDER BY bookmarked_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(sql_count(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut bookmarks = Vec::with_capacity(rows.len());
        for row in rows {
            bookmarks.push(Bookmark {
                user_id: row.try_get("user_id")?,
                article_id: row.try_get("article_id")?,
                bookmarked_at: row.try_get("bookmarked_at")?,
            });
        }
        Ok(bookmarks)
    }

    async fn bookmarked_ids(&self, user_id: &str, article_ids: &[String]) -> Result<HashSet<String>> {
        if article_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query("SELECT article_id FROM user_bookmarks WHERE user_id = $1 AND article_id = ANY($2)")
            .bind(user_id)
            .bind(article_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.try_get("article_id")?);
        }
        Ok(ids)
    }

    async fn record_activity(
        &self,
        user_id: &str,
        article_id: &str,
        action: ActivityAction,
        mood: Option<Mood>,
    ) -> Result<ActivityEvent> {
        let now = Utc::now();
        let event = ActivityEvent {
            user_id: user_id.to_string(),
            article_id: article_id.to_string(),
            action,
            mood,
            occurred_at: now,
            expires_at: now + self.config.activity_ttl,
        };

        sqlx::query(
            r#"
            INSERT INTO user_news_activity (user_id, article_id, action, mood, occurred_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&event.user_id)
        .bind(&event.article_id)
        .bind(event.action.as_str())
        .bind(event.mood.map(|m| m.as_str()))
        .bind(event.occurred_at)
        .bind(event.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(event)
    }

    async fn list_activity(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityEvent>> {
        let rows = sqlx::query(
            "SELECT user_id, article_id, action, mood, occurred_at, expires_at FROM user_news_activity \
             WHERE user_id = $1 ORDER BY occurred_at DESC, seq DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(sql_count(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(activity_from_row).collect::<std::result::Result<_, _>>()?)
    }

    async fn purge_expired_activity(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_news_activity WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
