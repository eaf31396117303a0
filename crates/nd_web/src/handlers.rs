use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use nd_core::{ArticleFilter, DailyCount, Page};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use crate::error::AppError;
use crate::export::{articles_to_csv, CSV_FILENAME};
use crate::views::{AuthorTemplate, ExportTemplate, ListingTemplate, OverviewTemplate};
use crate::AppState;

type HandlerResult<T> = Result<T, AppError>;

fn render<T: Template>(template: &T) -> HandlerResult<Html<String>> {
    let html = template
        .render()
        .map_err(|e| nd_core::Error::Template(e.to_string()))?;
    Ok(Html(html))
}

/// Query string of `/articles`. Everything is taken as text so that a
/// malformed `page` degrades to the first page instead of a 400, and a
/// repeated key keeps its first value.
#[derive(Debug, Default)]
pub struct ListingParams {
    pub page: Option<String>,
    pub search: Option<String>,
    pub author: Option<String>,
}

impl ListingParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut params.page,
                "search" => &mut params.search,
                "author" => &mut params.author,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub daily_counts: Vec<DailyCount>,
}

pub async fn overview(State(state): State<Arc<AppState>>) -> HandlerResult<Html<String>> {
    let overview = state.store.overview().await?;
    render(&OverviewTemplate::from(overview))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> HandlerResult<Html<String>> {
    let params = ListingParams::from_pairs(pairs);
    let page = Page::parse(params.page.as_deref());
    let filter = ArticleFilter::new(params.search, params.author);
    debug!("Listing page {} with {:?}", page.number(), filter);

    let listing = state.store.list_articles(&filter, page).await?;
    render(&ListingTemplate::new(listing, &filter))
}

pub async fn author_profile(
    State(state): State<Arc<AppState>>,
    Path(author_name): Path<String>,
) -> HandlerResult<Html<String>> {
    let profile = state.store.author_profile(&author_name).await?;
    render(&AuthorTemplate::from(profile))
}

pub async fn daily_stats(State(state): State<Arc<AppState>>) -> HandlerResult<Json<StatsResponse>> {
    let daily_counts = state.store.daily_counts().await?;
    Ok(Json(StatsResponse { daily_counts }))
}

pub async fn export_page() -> HandlerResult<Html<String>> {
    render(&ExportTemplate::default())
}

pub async fn export_csv(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let articles = state.store.export_articles().await?;
    let body = articles_to_csv(&articles)?;
    debug!("Exporting {} articles ({} bytes)", articles.len(), body.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", CSV_FILENAME),
            ),
        ],
        body,
    ))
}
