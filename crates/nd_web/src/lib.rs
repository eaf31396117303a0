use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod error;
pub mod export;
pub mod handlers;
pub mod state;
pub mod views;

pub use error::AppError;
pub use state::AppState;

/// Logs method, path, status and latency of every request.
pub fn logging_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::overview))
        .route("/articles", get(handlers::list_articles))
        .route("/author/:author_name", get(handlers::author_profile))
        .route("/api/stats", get(handlers::daily_stats))
        .route("/export", get(handlers::export_page))
        .route("/api/export/csv", get(handlers::export_csv))
        .layer(logging_layer())
        .layer(cors)
        .with_state(Arc::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, Utc};
    use nd_core::{
        Article, ArticleFilter, ArticleListing, ArticleStore, AuthorProfile, DailyCount, Overview,
        Page,
    };
    use nd_storage::MemoryStorage;
    use tower::ServiceExt;

    fn article(id: i64, title: &str, author: Option<&str>, hours_ago: i64) -> Article {
        Article {
            id,
            title: Some(title.to_string()),
            author: author.map(str::to_string),
            url: Some(format!("https://news.example/{}", id)),
            crawled_at: Some(Utc::now().naive_utc() - Duration::hours(hours_ago)),
        }
    }

    fn app_with(articles: Vec<Article>) -> Router {
        let store = Arc::new(MemoryStorage::with_articles(articles));
        create_app(AppState::new(store))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    struct FailingStore;

    fn unavailable() -> nd_core::Error {
        nd_core::Error::Database("connection refused".to_string())
    }

    #[async_trait]
    impl ArticleStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn overview(&self) -> nd_core::Result<Overview> {
            Err(unavailable())
        }

        async fn list_articles(&self, _: &ArticleFilter, _: Page) -> nd_core::Result<ArticleListing> {
            Err(unavailable())
        }

        async fn author_profile(&self, _: &str) -> nd_core::Result<AuthorProfile> {
            Err(unavailable())
        }

        async fn daily_counts(&self) -> nd_core::Result<Vec<DailyCount>> {
            Err(unavailable())
        }

        async fn export_articles(&self) -> nd_core::Result<Vec<Article>> {
            Err(unavailable())
        }
    }

    #[tokio::test]
    async fn test_overview_page() {
        let app = app_with(vec![
            article(1, "Storm warning", Some("bob"), 1),
            article(2, "Election night", None, 2),
        ]);
        let (status, headers, body) = get(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert!(body.contains("Storm warning"));
        assert!(body.contains("Election night"));
        assert!(body.contains("bob"));
    }

    #[tokio::test]
    async fn test_listing_search_is_case_insensitive_substring() {
        let app = app_with(vec![
            article(1, "A", Some("bob"), 1),
            article(2, "B", None, 0),
        ]);
        let (status, _, body) = get(app, "/articles?search=a").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("1 matching articles"));
        assert!(body.contains(">A</a>"));
        assert!(!body.contains(">B</a>"));
    }

    #[tokio::test]
    async fn test_listing_bad_page_falls_back_to_first() {
        let app = app_with(vec![article(1, "Only story", None, 1)]);
        let (status, _, body) = get(app, "/articles?page=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Page 1 of 1"));
        assert!(body.contains("Only story"));
    }

    #[tokio::test]
    async fn test_listing_repeated_keys_use_first_value() {
        let articles = (0..60).map(|id| article(id, "story", Some("bob"), id)).collect();
        let (status, _, body) = get(app_with(articles), "/articles?page=1&page=2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Page 1 of 2"));

        let app = app_with(vec![
            article(1, "Alpha", None, 1),
            article(2, "Beta", None, 1),
        ]);
        let (status, _, body) = get(app, "/articles?search=alp&search=bet").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("1 matching articles"));
        assert!(body.contains(">Alpha</a>"));
        assert!(!body.contains(">Beta</a>"));
    }

    #[tokio::test]
    async fn test_script_urls_are_not_linked() {
        let mut hostile = article(1, "Hostile", Some("bob"), 1);
        hostile.url = Some("javascript:alert(document.cookie)".to_string());
        let app = app_with(vec![hostile, article(2, "Benign", None, 2)]);

        for uri in ["/", "/articles", "/author/bob"] {
            let (status, _, body) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert!(!body.contains("javascript:"), "{}", uri);
            assert!(body.contains("Hostile"), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_listing_beyond_last_page_is_empty() {
        let articles = (0..60).map(|id| article(id, "story", Some("bob"), id)).collect();
        let app = app_with(articles);
        let (status, _, body) = get(app, "/articles?page=3").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("60 matching articles"));
        assert!(body.contains("Page 3 of 2"));
        assert!(body.contains("No articles found."));
    }

    #[tokio::test]
    async fn test_listing_author_filter_marks_selection() {
        let app = app_with(vec![
            article(1, "One", Some("alice"), 1),
            article(2, "Two", Some("bob"), 2),
        ]);
        let (_, _, body) = get(app, "/articles?author=bob").await;
        assert!(body.contains("1 matching articles"));
        assert!(body.contains("Two"));
        assert!(!body.contains(">One</a>"));
        assert!(body.contains("selected"));
    }

    #[tokio::test]
    async fn test_author_profile_decodes_path() {
        let app = app_with(vec![
            article(1, "Column", Some("Ana María"), 1),
            article(2, "Other", Some("bob"), 1),
        ]);
        let (status, _, body) = get(app, "/author/Ana%20Mar%C3%ADa").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Ana María"));
        assert!(body.contains("Column"));
        assert!(!body.contains(">Other</a>"));
    }

    #[tokio::test]
    async fn test_unknown_author_is_not_an_error() {
        let app = app_with(vec![article(1, "Column", Some("bob"), 1)]);
        let (status, _, body) = get(app, "/author/nobody").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No articles found."));
    }

    #[tokio::test]
    async fn test_daily_stats_json() {
        let app = app_with(vec![
            article(1, "A", Some("bob"), 1),
            article(2, "B", None, 1),
            article(3, "C", None, 24 * 60),
        ]);
        let (status, headers, body) = get(app, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let days = json["daily_counts"].as_array().unwrap();
        let today = (Utc::now() - Duration::hours(1)).date_naive();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0]["date"], today.format("%Y-%m-%d").to_string());
        assert_eq!(days[0]["count"], 2);
    }

    #[tokio::test]
    async fn test_export_page() {
        let (status, _, body) = get(app_with(vec![]), "/export").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("CSV"));
    }

    #[tokio::test]
    async fn test_export_csv_attachment() {
        let mut articles: Vec<Article> = (0..3)
            .map(|id| article(id, "story", Some("bob"), id))
            .collect();
        articles.push(Article {
            id: 99,
            title: None,
            author: None,
            url: None,
            crawled_at: None,
        });
        let app = app_with(articles);

        let (status, headers, body) = get(app, "/api/export/csv").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=articles.csv"
        );

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "Title,Author,URL,Crawled At");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], ",,,");
    }

    #[tokio::test]
    async fn test_store_failure_is_a_server_error() {
        for uri in ["/", "/articles", "/author/bob", "/api/stats", "/api/export/csv"] {
            let app = create_app(AppState::new(Arc::new(FailingStore)));
            let (status, _, body) = get(app, uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            assert!(!body.contains("connection refused"));
        }
    }

    #[tokio::test]
    async fn test_export_page_needs_no_database() {
        let app = create_app(AppState::new(Arc::new(FailingStore)));
        let (status, _, _) = get(app, "/export").await;
        assert_eq!(status, StatusCode::OK);
    }
}
