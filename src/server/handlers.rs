//! JSON request handlers for the web server.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::fetch::cookies;
use crate::models::{Article, EngagementSnapshot};
use crate::pipeline;
use crate::repository::{DieselError, SortField};

use super::AppState;

const DEFAULT_LEADERBOARD_LIMIT: i64 = 100;
const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Article as returned by the API.
#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    content_id: String,
    title: String,
    author_name: String,
    author_alias: Option<String>,
    likes_count: i32,
    comments_count: i32,
    engagement_score: f64,
    published_at: Option<String>,
    article_url: Option<String>,
    description: String,
    last_updated: String,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            content_id: article.content_id,
            title: article.title,
            author_name: article.author_name,
            author_alias: article.author_alias,
            likes_count: article.likes_count,
            comments_count: article.comments_count,
            engagement_score: article.engagement_score,
            published_at: article.published_at.map(|dt| dt.to_rfc3339()),
            article_url: article.article_url,
            description: article.description,
            last_updated: article.last_updated.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    likes_count: i32,
    comments_count: i32,
    engagement_score: f64,
    snapshot_at: String,
}

impl From<EngagementSnapshot> for SnapshotResponse {
    fn from(snapshot: EngagementSnapshot) -> Self {
        Self {
            likes_count: snapshot.likes_count,
            comments_count: snapshot.comments_count,
            engagement_score: snapshot.engagement_score,
            snapshot_at: snapshot.snapshot_at.to_rfc3339(),
        }
    }
}

fn db_error(e: DieselError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
        .into_response()
}

/// Service root: liveness plus update state.
pub async fn service_status(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "service": "articlepulse",
        "last_update": state.coordinator.last_update().await.map(|dt| dt.to_rfc3339()),
        "is_updating": state.coordinator.is_updating(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    limit: Option<i64>,
    sort: Option<String>,
    exclude_author: Option<String>,
}

/// Ranked articles. The configured default exclusion applies unless the
/// request names its own (an empty value disables it).
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    let sort = params
        .sort
        .as_deref()
        .and_then(SortField::from_str)
        .unwrap_or_default();
    let exclude = params
        .exclude_author
        .or_else(|| state.settings.config.leaderboard.exclude_author.clone())
        .filter(|author| !author.is_empty());

    match state
        .articles
        .leaderboard(limit, sort, exclude.as_deref())
        .await
    {
        Ok(articles) => Json(
            articles
                .into_iter()
                .map(ArticleResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => db_error(e),
    }
}

/// Store totals plus update state.
pub async fn stats(State(state): State<AppState>) -> Response {
    match state.articles.stats().await {
        Ok(stats) => Json(json!({
            "total_articles": stats.total_articles,
            "total_likes": stats.total_likes,
            "total_comments": stats.total_comments,
            "last_updated": state.coordinator.last_update().await.map(|dt| dt.to_rfc3339()),
            "is_updating": state.coordinator.is_updating(),
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

/// Single article lookup.
pub async fn article_detail(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Response {
    match state.articles.get(&content_id).await {
        Ok(Some(article)) => Json(ArticleResponse::from(article)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "article not found"})),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    limit: Option<i64>,
}

/// Engagement history for one article, newest first.
pub async fn article_history(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.articles.history(&content_id, limit).await {
        Ok(snapshots) => Json(
            snapshots
                .into_iter()
                .map(SnapshotResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

/// Case-insensitive title search.
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = match params.q.as_deref().filter(|q| !q.is_empty()) {
        Some(q) => q.to_string(),
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "missing query parameter q"})),
            )
                .into_response();
        }
    };

    match state.articles.search_title(&query).await {
        Ok(articles) => Json(
            articles
                .into_iter()
                .map(ArticleResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => db_error(e),
    }
}

/// Kick off a background ingest cycle. Rejected (not queued) when one is
/// already running.
pub async fn refresh(State(state): State<AppState>) -> Response {
    match state.coordinator.try_begin() {
        Some(permit) => {
            let coordinator = state.coordinator.clone();
            let settings = state.settings.clone();
            let articles = state.articles.clone();
            tokio::spawn(pipeline::run_cycle(permit, coordinator, settings, articles));
            Json(json!({
                "status": "started",
                "message": "refresh started in background",
            }))
            .into_response()
        }
        None => Json(json!({
            "status": "already_updating",
            "message": "update in progress",
        }))
        .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CookiePayload {
    #[serde(default)]
    cookies: Vec<serde_json::Value>,
}

/// Replace the session cookie file with a fresh browser export.
pub async fn update_cookies(
    State(state): State<AppState>,
    Json(payload): Json<CookiePayload>,
) -> Response {
    match cookies::save_cookies(&state.settings.cookie_path(), &payload.cookies) {
        Ok(count) => Json(json!({
            "status": "success",
            "message": format!("updated {} cookies; refresh to use them", count),
            "cookie_count": count,
        }))
        .into_response(),
        Err(e) => Json(json!({
            "status": "error",
            "message": e.to_string(),
        }))
        .into_response(),
    }
}

/// Report whether a usable cookie file is present.
pub async fn cookie_status(State(state): State<AppState>) -> Response {
    let path = state.settings.cookie_path();
    match cookies::cookie_count(&path) {
        Ok(0) => Json(json!({
            "status": "invalid",
            "message": "cookie file is empty",
        }))
        .into_response(),
        Ok(count) => Json(json!({
            "status": "valid",
            "message": format!("found {} cookies", count),
            "cookie_count": count,
        }))
        .into_response(),
        Err(cookies::CookieError::Missing(_)) => Json(json!({
            "status": "missing",
            "message": "no cookies.json found",
        }))
        .into_response(),
        Err(e) => Json(json!({
            "status": "invalid",
            "message": e.to_string(),
        }))
        .into_response(),
    }
}
