//! Row-to-response conversions. Stored ids and timestamps are written by
//! this service, so a parse failure means a corrupt row: log it and fall
//! back to a zero value rather than failing the whole response.

use chrono::{DateTime, Utc};
use meadow_db::models::{CommentRow, FeedItemRow, PostRow, UserRow};
use meadow_types::api::{CommentResponse, FeedItemResponse, PostResponse, UserResponse};
use tracing::warn;
use uuid::Uuid;

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {what} id {raw:?}: {e}");
        Uuid::default()
    })
}

pub(crate) fn parse_ts(raw: &str, what: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt {what} timestamp {raw:?}: {e}");
            DateTime::default()
        })
}

pub(crate) fn user_response(row: &UserRow) -> UserResponse {
    UserResponse {
        id: parse_uuid(&row.id, "user"),
        username: row.username.clone(),
        email: row.email.clone(),
        is_active: row.is_active,
        created_at: parse_ts(&row.created_at, "user"),
    }
}

pub(crate) fn post_response(row: PostRow, comments: Vec<CommentRow>) -> PostResponse {
    PostResponse {
        id: parse_uuid(&row.id, "post"),
        user_id: parse_uuid(&row.user_id, "post author"),
        title: row.title,
        content: row.content,
        tags: row.tags,
        version: row.version,
        created_at: parse_ts(&row.created_at, "post"),
        updated_at: parse_ts(&row.updated_at, "post"),
        comments: comments.into_iter().map(comment_response).collect(),
    }
}

pub(crate) fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: parse_uuid(&row.id, "comment"),
        post_id: parse_uuid(&row.post_id, "comment post"),
        user_id: parse_uuid(&row.user_id, "comment author"),
        author_username: row.author_username,
        content: row.content,
        created_at: parse_ts(&row.created_at, "comment"),
    }
}

pub(crate) fn feed_item_response(row: FeedItemRow) -> FeedItemResponse {
    FeedItemResponse {
        id: parse_uuid(&row.id, "post"),
        user_id: parse_uuid(&row.user_id, "post author"),
        author_username: row.author_username,
        title: row.title,
        content: row.content,
        tags: row.tags,
        version: row.version,
        comments_count: row.comments_count,
        created_at: parse_ts(&row.created_at, "post"),
        updated_at: parse_ts(&row.updated_at, "post"),
    }
}
