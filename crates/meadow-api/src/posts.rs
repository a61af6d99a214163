use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use meadow_db::models::PostRow;
use meadow_db::{FeedQuery, SortOrder};
use meadow_types::api::{CreatePostRequest, Envelope, UpdatePostRequest};

use crate::convert::{feed_item_response, post_response};
use crate::{ApiError, AppState, run_blocking};

const MAX_TITLE_LEN: usize = 200;
const MAX_CONTENT_LEN: usize = 5000;
const MAX_FEED_LIMIT: u32 = 100;

pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_text(&req.title, &req.content)?;

    let now = meadow_db::now_utc();
    let row = PostRow {
        id: Uuid::new_v4().to_string(),
        user_id: req.user_id.to_string(),
        title: req.title,
        content: req.content,
        tags: req.tags,
        created_at: now.clone(),
        updated_at: now,
        version: 1,
    };

    let app = state.clone();
    let stored = row.clone();
    run_blocking(move || app.db.create_post(&stored)).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            data: post_response(row, Vec::new()),
        }),
    ))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let id = post_id.to_string();
    let (post, comments) = run_blocking(move || {
        let post = app.db.get_post(&id)?;
        let comments = app.db.comments_for_post(&id)?;
        Ok((post, comments))
    })
    .await?;

    Ok(Json(Envelope {
        data: post_response(post, comments),
    }))
}

/// The request carries the version the caller last read; a stale one is
/// reported back as not-found so the caller re-reads and retries.
pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_text(&req.title, &req.content)?;
    if req.version < 1 {
        return Err(ApiError::Validation("version must be at least 1".to_string()));
    }

    let app = state.clone();
    let id = post_id.to_string();
    let now = meadow_db::now_utc();
    let UpdatePostRequest {
        title,
        content,
        version,
    } = req;
    let updated =
        run_blocking(move || app.db.update_post(&id, &title, &content, version, &now)).await?;

    Ok(Json(Envelope {
        data: post_response(updated, Vec::new()),
    }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let app = state.clone();
    let id = post_id.to_string();
    run_blocking(move || app.db.delete_post(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub sort: String,
}

fn default_limit() -> u32 {
    20
}

pub async fn feed(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = match params.sort.as_str() {
        "" | "desc" => SortOrder::Desc,
        "asc" => SortOrder::Asc,
        other => {
            return Err(ApiError::Validation(format!(
                "invalid sort {other:?}, expected asc or desc"
            )));
        }
    };

    let query = FeedQuery {
        limit: params.limit.clamp(1, MAX_FEED_LIMIT),
        offset: params.offset,
        search: params.search,
        tag: params.tag,
        sort,
    };

    let app = state.clone();
    let id = user_id.to_string();
    let rows = run_blocking(move || app.db.feed(&id, &query)).await?;

    Ok(Json(Envelope {
        data: rows
            .into_iter()
            .map(feed_item_response)
            .collect::<Vec<_>>(),
    }))
}

fn validate_text(title: &str, content: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() || title.len() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "title must be 1-{MAX_TITLE_LEN} characters"
        )));
    }
    if content.trim().is_empty() || content.len() > MAX_CONTENT_LEN {
        return Err(ApiError::Validation(format!(
            "content must be 1-{MAX_CONTENT_LEN} characters"
        )));
    }
    Ok(())
}
