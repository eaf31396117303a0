use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A crawled news item as stored by the external crawler.
///
/// Every text column is nullable in the crawler's table, so the dashboard
/// never assumes a value is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub crawled_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    pub article_count: i64,
}

/// Headline numbers for the landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_articles: i64,
    pub total_authors: i64,
    pub recent_24h: i64,
    pub first_crawl: Option<NaiveDateTime>,
    pub last_crawl: Option<NaiveDateTime>,
    pub top_authors: Vec<AuthorCount>,
    pub recent_articles: Vec<Article>,
}

/// One page of the filtered article listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleListing {
    pub articles: Vec<Article>,
    pub page: i64,
    pub total: i64,
    pub total_pages: i64,
    /// Every distinct non-null author, ascending, for the filter control.
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorStats {
    pub article_count: i64,
    pub first_article: Option<NaiveDateTime>,
    pub latest_article: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub name: String,
    pub stats: AuthorStats,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}
