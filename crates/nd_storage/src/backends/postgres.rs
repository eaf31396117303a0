use async_trait::async_trait;
use nd_core::config::DatabaseConfig;
use nd_core::storage::{
    ArticleStore, DAILY_STATS_WINDOW_DAYS, RECENT_ARTICLES_LIMIT, RECENT_WINDOW_HOURS,
    TOP_AUTHORS_LIMIT,
};
use nd_core::{
    pagination, Article, ArticleFilter, ArticleListing, AuthorCount, AuthorProfile, AuthorStats,
    DailyCount, Overview, Page, Result, SqlDialect, WhereClause,
};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Connection, Row};
use tracing::debug;
use super::{db_error, release};

// `id` and `crawled_at` are cast so that int4/timestamptz columns decode too.
const ARTICLE_COLUMNS: &str = "id::bigint AS id, title, author, url, crawled_at::timestamp AS crawled_at";
const NEWEST_FIRST: &str = "ORDER BY crawled_at DESC NULLS LAST, id DESC";

/// Postgres backend. Holds only connection options; each operation opens
/// its own connection and closes it before returning.
pub struct PostgresStorage {
    options: PgConnectOptions,
    target: String,
}

impl PostgresStorage {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);
        Self {
            options,
            target: config.target(),
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        debug!("Opening connection to {}", self.target);
        PgConnection::connect_with(&self.options)
            .await
            .map_err(db_error("connect to postgres"))
    }

    /// Opens and closes one connection.
    pub async fn check_connection(&self) -> Result<()> {
        let conn = self.connect().await?;
        release(conn, self.name()).await;
        Ok(())
    }
}

fn article_from_row(row: &PgRow) -> std::result::Result<Article, sqlx::Error> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        url: row.try_get("url")?,
        crawled_at: row.try_get("crawled_at")?,
    })
}

async fn fetch_articles(
    conn: &mut PgConnection,
    sql: &str,
    binds: &[&str],
    limit: Option<i64>,
) -> std::result::Result<Vec<Article>, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in binds {
        query = query.bind(*value);
    }
    if let Some(limit) = limit {
        query = query.bind(limit);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(article_from_row).collect()
}

async fn load_overview(conn: &mut PgConnection) -> std::result::Result<Overview, sqlx::Error> {
    let total_articles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(&mut *conn)
        .await?;

    let total_authors: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT author) FROM articles WHERE author IS NOT NULL",
    )
    .fetch_one(&mut *conn)
    .await?;

    let recent_24h: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM articles WHERE crawled_at > NOW() - make_interval(hours => $1::int)",
    )
    .bind(RECENT_WINDOW_HOURS)
    .fetch_one(&mut *conn)
    .await?;

    let range = sqlx::query(
        r#"
        SELECT MIN(crawled_at)::timestamp AS first, MAX(crawled_at)::timestamp AS last
        FROM articles
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    let top_authors = sqlx::query(
        r#"
        SELECT author, COUNT(*) AS article_count
        FROM articles
        WHERE author IS NOT NULL
        GROUP BY author
        ORDER BY article_count DESC, author ASC
        LIMIT $1
        "#,
    )
    .bind(TOP_AUTHORS_LIMIT)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(|row| -> std::result::Result<AuthorCount, sqlx::Error> {
        Ok(AuthorCount {
            author: row.try_get("author")?,
            article_count: row.try_get("article_count")?,
        })
    })
    .collect::<std::result::Result<Vec<_>, _>>()?;

    let recent_sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles {NEWEST_FIRST} LIMIT $1");
    let recent_articles = fetch_articles(conn, &recent_sql, &[], Some(RECENT_ARTICLES_LIMIT)).await?;

    Ok(Overview {
        total_articles,
        total_authors,
        recent_24h,
        first_crawl: range.try_get("first")?,
        last_crawl: range.try_get("last")?,
        top_authors,
        recent_articles,
    })
}

async fn load_listing(
    conn: &mut PgConnection,
    filter: &ArticleFilter,
    page: Page,
) -> std::result::Result<ArticleListing, sqlx::Error> {
    let clause = WhereClause::build(filter, SqlDialect::Postgres);

    let count_sql = format!("SELECT COUNT(*) FROM articles{}", clause.sql());
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    for value in clause.params() {
        count = count.bind(value);
    }
    let total = count.fetch_one(&mut *conn).await?;

    let page_sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles{} {NEWEST_FIRST} LIMIT {} OFFSET {}",
        clause.sql(),
        clause.next_placeholder(1),
        clause.next_placeholder(2),
    );
    let mut rows = sqlx::query(&page_sql);
    for value in clause.params() {
        rows = rows.bind(value);
    }
    let articles = rows
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(article_from_row)
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

    let authors: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT author FROM articles WHERE author IS NOT NULL ORDER BY author",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(ArticleListing {
        articles,
        page: page.number(),
        total,
        total_pages: pagination::total_pages(total),
        authors,
    })
}

async fn load_author(
    conn: &mut PgConnection,
    author: &str,
) -> std::result::Result<AuthorProfile, sqlx::Error> {
    let stats = sqlx::query(
        r#"
        SELECT COUNT(*) AS article_count,
               MIN(crawled_at)::timestamp AS first_article,
               MAX(crawled_at)::timestamp AS latest_article
        FROM articles
        WHERE author = $1
        "#,
    )
    .bind(author)
    .fetch_one(&mut *conn)
    .await?;

    let articles_sql =
        format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE author = $1 {NEWEST_FIRST}");
    let articles = fetch_articles(conn, &articles_sql, &[author], None).await?;

    Ok(AuthorProfile {
        name: author.to_string(),
        stats: AuthorStats {
            article_count: stats.try_get("article_count")?,
            first_article: stats.try_get("first_article")?,
            latest_article: stats.try_get("latest_article")?,
        },
        articles,
    })
}

async fn load_daily_counts(
    conn: &mut PgConnection,
) -> std::result::Result<Vec<DailyCount>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DATE(crawled_at) AS date, COUNT(*) AS count
        FROM articles
        WHERE crawled_at > NOW() - make_interval(days => $1::int)
        GROUP BY DATE(crawled_at)
        ORDER BY date
        "#,
    )
    .bind(DAILY_STATS_WINDOW_DAYS)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> std::result::Result<DailyCount, sqlx::Error> {
            Ok(DailyCount {
                date: row.try_get("date")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

#[async_trait]
impl ArticleStore for PostgresStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn overview(&self) -> Result<Overview> {
        let mut conn = self.connect().await?;
        let result = load_overview(&mut conn).await;
        release(conn, self.name()).await;
        result.map_err(db_error("load overview"))
    }

    async fn list_articles(&self, filter: &ArticleFilter, page: Page) -> Result<ArticleListing> {
        let mut conn = self.connect().await?;
        let result = load_listing(&mut conn, filter, page).await;
        release(conn, self.name()).await;
        result.map_err(db_error("list articles"))
    }

    async fn author_profile(&self, author: &str) -> Result<AuthorProfile> {
        let mut conn = self.connect().await?;
        let result = load_author(&mut conn, author).await;
        release(conn, self.name()).await;
        result.map_err(db_error("load author profile"))
    }

    async fn daily_counts(&self) -> Result<Vec<DailyCount>> {
        let mut conn = self.connect().await?;
        let result = load_daily_counts(&mut conn).await;
        release(conn, self.name()).await;
        result.map_err(db_error("load daily counts"))
    }

    async fn export_articles(&self) -> Result<Vec<Article>> {
        let mut conn = self.connect().await?;
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles {NEWEST_FIRST}");
        let result = fetch_articles(&mut conn, &sql, &[], None).await;
        release(conn, self.name()).await;
        result.map_err(db_error("export articles"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_hides_password() {
        let config = DatabaseConfig {
            password: "hunter2".to_string(),
            ..DatabaseConfig::default()
        };
        let storage = PostgresStorage::new(&config);
        assert_eq!(storage.name(), "postgres");
        assert!(!storage.target.contains("hunter2"));
    }
}
