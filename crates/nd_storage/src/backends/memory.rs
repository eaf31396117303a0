use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use nd_core::storage::{
    ArticleStore, DAILY_STATS_WINDOW_DAYS, RECENT_ARTICLES_LIMIT, RECENT_WINDOW_HOURS,
    TOP_AUTHORS_LIMIT,
};
use nd_core::{
    pagination, Article, ArticleFilter, ArticleListing, AuthorCount, AuthorProfile, AuthorStats,
    DailyCount, Overview, Page, Result,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process article table with the same read semantics as the SQL
/// backends.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    articles: Arc<RwLock<Vec<Article>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<Article>) -> Self {
        Self {
            articles: Arc::new(RwLock::new(articles)),
        }
    }

    /// Adds or replaces (by id) a row.
    pub async fn insert(&self, article: Article) {
        let mut articles = self.articles.write().await;
        match articles.iter_mut().find(|a| a.id == article.id) {
            Some(existing) => *existing = article,
            None => articles.push(article),
        }
    }
}

/// `crawled_at DESC`, untimed rows last, newer ids first on ties.
fn newest_first(a: &Article, b: &Article) -> Ordering {
    b.crawled_at
        .cmp(&a.crawled_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn sorted_newest_first<'a>(articles: impl Iterator<Item = &'a Article>) -> Vec<Article> {
    let mut sorted: Vec<Article> = articles.cloned().collect();
    sorted.sort_by(newest_first);
    sorted
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn crawl_range(articles: &[Article]) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let timestamps = articles.iter().filter_map(|a| a.crawled_at);
    let first = timestamps.clone().min();
    let last = timestamps.max();
    (first, last)
}

fn to_limit(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn overview(&self) -> Result<Overview> {
        let articles = self.articles.read().await;
        let cutoff = now() - Duration::hours(RECENT_WINDOW_HOURS);

        let mut per_author: HashMap<&str, i64> = HashMap::new();
        for author in articles.iter().filter_map(|a| a.author.as_deref()) {
            *per_author.entry(author).or_default() += 1;
        }
        let mut top_authors: Vec<AuthorCount> = per_author
            .iter()
            .map(|(author, count)| AuthorCount {
                author: author.to_string(),
                article_count: *count,
            })
            .collect();
        top_authors.sort_by(|a, b| {
            b.article_count
                .cmp(&a.article_count)
                .then_with(|| a.author.cmp(&b.author))
        });
        top_authors.truncate(to_limit(TOP_AUTHORS_LIMIT));

        let mut recent_articles = sorted_newest_first(articles.iter());
        recent_articles.truncate(to_limit(RECENT_ARTICLES_LIMIT));

        let (first_crawl, last_crawl) = crawl_range(&articles);

        Ok(Overview {
            total_articles: articles.len() as i64,
            total_authors: per_author.len() as i64,
            recent_24h: articles
                .iter()
                .filter(|a| a.crawled_at.map_or(false, |at| at > cutoff))
                .count() as i64,
            first_crawl,
            last_crawl,
            top_authors,
            recent_articles,
        })
    }

    async fn list_articles(&self, filter: &ArticleFilter, page: Page) -> Result<ArticleListing> {
        let articles = self.articles.read().await;
        let matching = sorted_newest_first(articles.iter().filter(|a| filter.matches(a)));
        let total = matching.len() as i64;

        let authors: BTreeSet<&str> = articles.iter().filter_map(|a| a.author.as_deref()).collect();

        Ok(ArticleListing {
            articles: matching
                .into_iter()
                .skip(to_limit(page.offset()))
                .take(to_limit(page.limit()))
                .collect(),
            page: page.number(),
            total,
            total_pages: pagination::total_pages(total),
            authors: authors.into_iter().map(str::to_string).collect(),
        })
    }

    async fn author_profile(&self, author: &str) -> Result<AuthorProfile> {
        let articles = self.articles.read().await;
        let by_author = sorted_newest_first(
            articles.iter().filter(|a| a.author.as_deref() == Some(author)),
        );
        let (first_article, latest_article) = crawl_range(&by_author);

        Ok(AuthorProfile {
            name: author.to_string(),
            stats: AuthorStats {
                article_count: by_author.len() as i64,
                first_article,
                latest_article,
            },
            articles: by_author,
        })
    }

    async fn daily_counts(&self) -> Result<Vec<DailyCount>> {
        let articles = self.articles.read().await;
        let cutoff = now() - Duration::days(DAILY_STATS_WINDOW_DAYS);

        let mut per_day = BTreeMap::new();
        for at in articles.iter().filter_map(|a| a.crawled_at).filter(|at| *at > cutoff) {
            *per_day.entry(at.date()).or_insert(0i64) += 1;
        }
        Ok(per_day
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }

    async fn export_articles(&self) -> Result<Vec<Article>> {
        let articles = self.articles.read().await;
        Ok(sorted_newest_first(articles.iter()))
    }
}
