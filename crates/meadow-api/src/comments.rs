use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use meadow_types::api::{CommentResponse, CreateCommentRequest, Envelope};

use crate::convert::parse_ts;
use crate::{ApiError, AppState, run_blocking};

const MAX_COMMENT_LEN: usize = 1000;

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() || req.content.len() > MAX_COMMENT_LEN {
        return Err(ApiError::Validation(format!(
            "content must be 1-{MAX_COMMENT_LEN} characters"
        )));
    }

    let id = Uuid::new_v4();
    let now = meadow_db::now_utc();

    let app = state.clone();
    let cid = id.to_string();
    let pid = post_id.to_string();
    let uid = req.user_id.to_string();
    let content = req.content.clone();
    let created_at = now.clone();
    // The author lookup doubles as an existence check and supplies the
    // username for the response.
    let author = run_blocking(move || {
        let author = app.db.get_user_by_id(&uid)?;
        app.db.create_comment(&cid, &pid, &uid, &content, &created_at)?;
        Ok(author)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            data: CommentResponse {
                id,
                post_id,
                user_id: req.user_id,
                author_username: author.username,
                content: req.content,
                created_at: parse_ts(&now, "comment"),
            },
        }),
    ))
}
