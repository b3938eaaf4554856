//! HTTP request handlers
//!
//! Handlers stay thin: they read from the repository, start background
//! favicon work, and shape the response.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use super::responses::{PaginatedResponse, accepted, handle_error, handle_result};
use crate::errors::{AppError, AppResult};
use crate::models::Bookmark;

const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshQueued {
    pub total: usize,
    pub queued: usize,
}

pub async fn health() -> impl IntoResponse {
    handle_result::<HealthStatus>(Ok(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// List bookmarks newest first and kick off favicon work for the page
pub async fn list_bookmarks(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Response {
    handle_result(list_page(&state, params).await)
}

async fn list_page(
    state: &AppState,
    params: PaginationParams,
) -> AppResult<PaginatedResponse<Bookmark>> {
    let per_page = params.limit.unwrap_or(state.config.web.items_per_page);
    if per_page == 0 || per_page > MAX_PAGE_SIZE {
        return Err(AppError::validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    let page = params.page.unwrap_or(1).max(1);

    let all = state.repository.all().await?;
    let total = all.len() as u64;
    let skip = (page as usize - 1).saturating_mul(per_page as usize);
    let mut items: Vec<Bookmark> = all.into_iter().skip(skip).take(per_page as usize).collect();

    let annotated = state.pipeline.annotate_cached(&mut items).await;
    if annotated > 0 {
        debug!("Resolved {} favicons from cache for page {}", annotated, page);
    }
    state.spawn_favicon_run(items.clone());

    Ok(PaginatedResponse::new(items, total, page, per_page))
}

pub async fn get_bookmark(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let result = async {
        let mut bookmark = state
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Bookmark", id))?;
        state
            .pipeline
            .annotate_cached(std::slice::from_mut(&mut bookmark))
            .await;
        Ok::<_, AppError>(bookmark)
    }
    .await;

    handle_result(result)
}

/// Queue a favicon run over every stored bookmark
pub async fn refresh_favicons(State(state): State<AppState>) -> Response {
    let mut bookmarks = match state.repository.all().await {
        Ok(bookmarks) => bookmarks,
        Err(e) => return handle_error(e.into()).into_response(),
    };
    state.pipeline.annotate_cached(&mut bookmarks).await;

    let total = bookmarks.len();
    let queued = bookmarks.iter().filter(|b| !b.is_resolved()).count();
    state.spawn_favicon_run(bookmarks);

    accepted(RefreshQueued { total, queued }).into_response()
}
