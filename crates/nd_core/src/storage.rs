use async_trait::async_trait;
use crate::pagination::Page;
use crate::query::ArticleFilter;
use crate::types::{Article, ArticleListing, AuthorProfile, DailyCount, Overview};
use crate::Result;

/// Window for the overview's "crawled recently" counter.
pub const RECENT_WINDOW_HOURS: i64 = 24;
pub const TOP_AUTHORS_LIMIT: i64 = 10;
pub const RECENT_ARTICLES_LIMIT: i64 = 20;
/// Trailing window covered by the daily statistics endpoint.
pub const DAILY_STATS_WINDOW_DAYS: i64 = 30;

/// Read-only access to the crawler's `articles` table.
///
/// Implementations hold no state between calls; every method observes the
/// table as it is at the time of the call.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Totals, crawl range, top authors and the most recent articles.
    async fn overview(&self) -> Result<Overview>;

    /// One page of articles matching `filter`, newest first.
    async fn list_articles(&self, filter: &ArticleFilter, page: Page) -> Result<ArticleListing>;

    /// Aggregates and articles for an exact author name. Unknown authors
    /// yield zero counts rather than an error.
    async fn author_profile(&self, author: &str) -> Result<AuthorProfile>;

    /// Per-day crawl counts over the trailing window, oldest day first.
    /// Days without articles are omitted.
    async fn daily_counts(&self) -> Result<Vec<DailyCount>>;

    /// Every article, newest first.
    async fn export_articles(&self) -> Result<Vec<Article>>;
}
