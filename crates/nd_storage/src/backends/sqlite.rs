use async_trait::async_trait;
use chrono::NaiveDate;
use nd_core::storage::{
    ArticleStore, DAILY_STATS_WINDOW_DAYS, RECENT_ARTICLES_LIMIT, RECENT_WINDOW_HOURS,
    TOP_AUTHORS_LIMIT,
};
use nd_core::{
    pagination, Article, ArticleFilter, ArticleListing, AuthorCount, AuthorProfile, AuthorStats,
    DailyCount, Overview, Page, Result, SqlDialect, WhereClause,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row};
use std::path::{Path, PathBuf};
use tracing::debug;
use super::{db_error, release};

const ARTICLE_COLUMNS: &str = "id, title, author, url, crawled_at";
// SQLite already sorts NULL lowest, so DESC leaves untimed rows at the end.
const NEWEST_FIRST: &str = "ORDER BY crawled_at DESC, id DESC";

/// Read-only view over a SQLite snapshot of the crawler's table.
pub struct SqliteStorage {
    options: SqliteConnectOptions,
    db_path: PathBuf,
}

impl SqliteStorage {
    pub fn new_with_path<P: AsRef<Path>>(db_path: P) -> Self {
        let db_path = db_path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .read_only(true);
        Self { options, db_path }
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        debug!("Opening {}", self.db_path.display());
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(db_error("open sqlite database"))
    }

    pub async fn check_connection(&self) -> Result<()> {
        let conn = self.connect().await?;
        release(conn, self.name()).await;
        Ok(())
    }
}

fn article_from_row(row: &SqliteRow) -> std::result::Result<Article, sqlx::Error> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        url: row.try_get("url")?,
        crawled_at: row.try_get("crawled_at")?,
    })
}

fn articles_from_rows(rows: &[SqliteRow]) -> std::result::Result<Vec<Article>, sqlx::Error> {
    rows.iter().map(article_from_row).collect()
}

async fn load_overview(conn: &mut SqliteConnection) -> std::result::Result<Overview, sqlx::Error> {
    let total_articles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(&mut *conn)
        .await?;

    let total_authors: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT author) FROM articles WHERE author IS NOT NULL",
    )
    .fetch_one(&mut *conn)
    .await?;

    let recent_24h: i64 =
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE datetime(crawled_at) > datetime('now', ?)",
        )
            .bind(format!("-{} hours", RECENT_WINDOW_HOURS))
            .fetch_one(&mut *conn)
            .await?;

    let range = sqlx::query("SELECT MIN(crawled_at) AS first, MAX(crawled_at) AS last FROM articles")
        .fetch_one(&mut *conn)
        .await?;

    let author_rows = sqlx::query(
        r#"
        SELECT author, COUNT(*) AS article_count
        FROM articles
        WHERE author IS NOT NULL
        GROUP BY author
        ORDER BY article_count DESC, author ASC
        LIMIT ?
        "#,
    )
    .bind(TOP_AUTHORS_LIMIT)
    .fetch_all(&mut *conn)
    .await?;
    let mut top_authors = Vec::with_capacity(author_rows.len());
    for row in &author_rows {
        top_authors.push(AuthorCount {
            author: row.try_get("author")?,
            article_count: row.try_get("article_count")?,
        });
    }

    let recent_rows = sqlx::query(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles {NEWEST_FIRST} LIMIT ?"
    ))
    .bind(RECENT_ARTICLES_LIMIT)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Overview {
        total_articles,
        total_authors,
        recent_24h,
        first_crawl: range.try_get("first")?,
        last_crawl: range.try_get("last")?,
        top_authors,
        recent_articles: articles_from_rows(&recent_rows)?,
    })
}

async fn load_listing(
    conn: &mut SqliteConnection,
    filter: &ArticleFilter,
    page: Page,
) -> std::result::Result<ArticleListing, sqlx::Error> {
    let clause = WhereClause::build(filter, SqlDialect::Sqlite);

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
    let mut query = sqlx::query(&page_sql);
    for value in clause.params() {
        query = query.bind(value);
    }
    let rows = query
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

    let authors: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT author FROM articles WHERE author IS NOT NULL ORDER BY author",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(ArticleListing {
        articles: articles_from_rows(&rows)?,
        page: page.number(),
        total,
        total_pages: pagination::total_pages(total),
        authors,
    })
}

async fn load_author(
    conn: &mut SqliteConnection,
    author: &str,
) -> std::result::Result<AuthorProfile, sqlx::Error> {
    let stats = sqlx::query(
        r#"
        SELECT COUNT(*) AS article_count,
               MIN(crawled_at) AS first_article,
               MAX(crawled_at) AS latest_article
        FROM articles
        WHERE author = ?
        "#,
    )
    .bind(author)
    .fetch_one(&mut *conn)
    .await?;

    let rows = sqlx::query(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles WHERE author = ? {NEWEST_FIRST}"
    ))
    .bind(author)
    .fetch_all(&mut *conn)
    .await?;

    Ok(AuthorProfile {
        name: author.to_string(),
        stats: AuthorStats {
            article_count: stats.try_get("article_count")?,
            first_article: stats.try_get("first_article")?,
            latest_article: stats.try_get("latest_article")?,
        },
        articles: articles_from_rows(&rows)?,
    })
}

async fn load_daily_counts(
    conn: &mut SqliteConnection,
) -> std::result::Result<Vec<DailyCount>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DATE(crawled_at) AS date, COUNT(*) AS count
        FROM articles
        WHERE datetime(crawled_at) > datetime('now', ?)
        GROUP BY DATE(crawled_at)
        ORDER BY date
        "#,
    )
    .bind(format!("-{} days", DAILY_STATS_WINDOW_DAYS))
    .fetch_all(&mut *conn)
    .await?;

    let mut counts = Vec::with_capacity(rows.len());
    for row in &rows {
        // DATE() yields TEXT in SQLite
        let date: String = row.try_get("date")?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        counts.push(DailyCount {
            date,
            count: row.try_get("count")?,
        });
    }
    Ok(counts)
}

async fn load_export(conn: &mut SqliteConnection) -> std::result::Result<Vec<Article>, sqlx::Error> {
    let rows = sqlx::query(&format!("SELECT {ARTICLE_COLUMNS} FROM articles {NEWEST_FIRST}"))
        .fetch_all(&mut *conn)
        .await?;
    articles_from_rows(&rows)
}

#[async_trait]
impl ArticleStore for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
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
        let result = load_export(&mut conn).await;
        release(conn, self.name()).await;
        result.map_err(db_error("export articles"))
    }
}
