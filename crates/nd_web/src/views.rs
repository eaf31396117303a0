//! askama page templates and the flattened rows they render.
//!
//! Templates only see plain strings and flags; formatting of timestamps,
//! links and placeholders for missing values happens here.

use askama::Template;
use chrono::NaiveDateTime;
use nd_core::{Article, ArticleFilter, ArticleListing, AuthorProfile, Overview, Page};
use url::{form_urlencoded, Url};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const MISSING: &str = "-";

pub fn display_timestamp(at: Option<NaiveDateTime>) -> String {
    at.map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

/// Path of an author's profile, with the name percent-encoded as a single
/// path segment.
pub fn author_href(name: &str) -> String {
    format!("/author/{}", urlencoding::encode(name))
}

/// Listing URL for `page` that keeps the active filters.
pub fn listing_href(page: Page, filter: &ArticleFilter) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("page", &page.number().to_string());
    if let Some(search) = filter.search() {
        query.append_pair("search", search);
    }
    if let Some(author) = filter.author() {
        query.append_pair("author", author);
    }
    format!("/articles?{}", query.finish())
}

/// Crawled URLs are only rendered as links when they are absolute http(s).
pub fn external_href(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[derive(Debug, Clone)]
pub struct AuthorLink {
    pub name: String,
    pub href: String,
}

impl AuthorLink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            href: author_href(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArticleRow {
    pub title: String,
    pub url: Option<String>,
    pub author: Option<AuthorLink>,
    pub crawled_at: String,
}

impl From<&Article> for ArticleRow {
    fn from(article: &Article) -> Self {
        let title = article
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("(untitled)")
            .to_string();
        Self {
            title,
            url: article.url.as_deref().and_then(external_href),
            author: article.author.as_deref().map(AuthorLink::new),
            crawled_at: display_timestamp(article.crawled_at),
        }
    }
}

fn rows(articles: &[Article]) -> Vec<ArticleRow> {
    articles.iter().map(ArticleRow::from).collect()
}

#[derive(Debug, Clone)]
pub struct TopAuthorRow {
    pub link: AuthorLink,
    pub article_count: i64,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct OverviewTemplate {
    pub total_articles: i64,
    pub total_authors: i64,
    pub recent_24h: i64,
    pub first_crawl: String,
    pub last_crawl: String,
    pub top_authors: Vec<TopAuthorRow>,
    /// Most recently crawled articles.
    pub articles: Vec<ArticleRow>,
}

impl From<Overview> for OverviewTemplate {
    fn from(overview: Overview) -> Self {
        Self {
            total_articles: overview.total_articles,
            total_authors: overview.total_authors,
            recent_24h: overview.recent_24h,
            first_crawl: display_timestamp(overview.first_crawl),
            last_crawl: display_timestamp(overview.last_crawl),
            top_authors: overview
                .top_authors
                .iter()
                .map(|a| TopAuthorRow {
                    link: AuthorLink::new(&a.author),
                    article_count: a.article_count,
                })
                .collect(),
            articles: rows(&overview.recent_articles),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorOption {
    pub name: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "articles.html")]
pub struct ListingTemplate {
    pub articles: Vec<ArticleRow>,
    pub page: i64,
    pub total: i64,
    pub total_pages: i64,
    pub search: String,
    pub authors: Vec<AuthorOption>,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl ListingTemplate {
    pub fn new(listing: ArticleListing, filter: &ArticleFilter) -> Self {
        let page = Page::new(listing.page);
        let selected = filter.author().unwrap_or_default();
        Self {
            articles: rows(&listing.articles),
            page: listing.page,
            total: listing.total,
            total_pages: listing.total_pages,
            search: filter.search().unwrap_or_default().to_string(),
            authors: listing
                .authors
                .into_iter()
                .map(|name| AuthorOption {
                    selected: name == selected,
                    name,
                })
                .collect(),
            prev_href: page.previous().map(|p| listing_href(p, filter)),
            next_href: page.next(listing.total_pages).map(|p| listing_href(p, filter)),
        }
    }
}

#[derive(Template)]
#[template(path = "author.html")]
pub struct AuthorTemplate {
    pub name: String,
    pub article_count: i64,
    pub first_article: String,
    pub latest_article: String,
    pub articles: Vec<ArticleRow>,
}

impl From<AuthorProfile> for AuthorTemplate {
    fn from(profile: AuthorProfile) -> Self {
        Self {
            article_count: profile.stats.article_count,
            first_article: display_timestamp(profile.stats.first_article),
            latest_article: display_timestamp(profile.stats.latest_article),
            articles: rows(&profile.articles),
            name: profile.name,
        }
    }
}

#[derive(Template, Default)]
#[template(path = "export.html")]
pub struct ExportTemplate {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_author_href_encodes_path_segment() {
        assert_eq!(author_href("bob"), "/author/bob");
        assert_eq!(author_href("Ana María"), "/author/Ana%20Mar%C3%ADa");
        assert_eq!(author_href("a/b?c"), "/author/a%2Fb%3Fc");
    }

    #[test]
    fn test_listing_href_keeps_filters() {
        let filter = ArticleFilter::new(Some("rust lang".to_string()), Some("bob".to_string()));
        assert_eq!(
            listing_href(Page::new(3), &filter),
            "/articles?page=3&search=rust+lang&author=bob"
        );
        assert_eq!(
            listing_href(Page::new(1), &ArticleFilter::default()),
            "/articles?page=1"
        );
    }

    #[test]
    fn test_article_row_placeholders() {
        let row = ArticleRow::from(&Article {
            id: 7,
            title: Some("  ".to_string()),
            author: None,
            url: None,
            crawled_at: None,
        });
        assert_eq!(row.title, "(untitled)");
        assert!(row.author.is_none());
        assert_eq!(row.crawled_at, "-");

        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(display_timestamp(Some(at)), "2024-03-09 14:05");
    }

    #[test]
    fn test_only_http_urls_become_links() {
        let row = |url: &str| {
            ArticleRow::from(&Article {
                id: 1,
                title: Some("Story".to_string()),
                author: None,
                url: Some(url.to_string()),
                crawled_at: None,
            })
        };
        assert_eq!(
            row("https://news.example/a?b=1").url.as_deref(),
            Some("https://news.example/a?b=1")
        );
        assert_eq!(row("http://news.example/").url.as_deref(), Some("http://news.example/"));
        assert!(row("javascript:alert(document.cookie)").url.is_none());
        assert!(row("JaVaScRiPt:alert(1)").url.is_none());
        assert!(row("data:text/html,<script>alert(1)</script>").url.is_none());
        assert!(row("/relative/path").url.is_none());
        assert!(row("").url.is_none());
    }

    #[test]
    fn test_listing_navigation_links() {
        let listing = ArticleListing {
            articles: vec![],
            page: 2,
            total: 120,
            total_pages: 3,
            authors: vec!["alice".to_string(), "bob".to_string()],
        };
        let filter = ArticleFilter::new(None, Some("bob".to_string()));
        let view = ListingTemplate::new(listing, &filter);
        assert_eq!(view.prev_href.as_deref(), Some("/articles?page=1&author=bob"));
        assert_eq!(view.next_href.as_deref(), Some("/articles?page=3&author=bob"));
        assert!(!view.authors[0].selected);
        assert!(view.authors[1].selected);
    }

    #[test]
    fn test_templates_escape_html() {
        let view = AuthorTemplate {
            name: "<script>alert(1)</script>".to_string(),
            article_count: 0,
            first_article: "-".to_string(),
            latest_article: "-".to_string(),
            articles: vec![],
        };
        let html = view.render().unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
