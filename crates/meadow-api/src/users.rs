use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use meadow_types::api::{Envelope, FollowRequest};

use crate::convert::user_response;
use crate::{ApiError, AppState, run_blocking};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let id = user_id.to_string();
    let user = run_blocking(move || app.db.get_user_by_id(&id)).await?;

    Ok(Json(Envelope {
        data: user_response(&user),
    }))
}

/// The acting follower arrives in the body, already vetted by the caller;
/// there is no session to derive it from.
pub async fn follow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<FollowRequest>,
) -> Result<StatusCode, ApiError> {
    if req.follower_id == user_id {
        return Err(ApiError::Validation(
            "cannot follow yourself".to_string(),
        ));
    }

    let app = state.clone();
    let follower = req.follower_id.to_string();
    let followed = user_id.to_string();
    let now = meadow_db::now_utc();
    run_blocking(move || app.db.follow(&follower, &followed, &now)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<FollowRequest>,
) -> Result<StatusCode, ApiError> {
    let app = state.clone();
    let follower = req.follower_id.to_string();
    let followed = user_id.to_string();
    run_blocking(move || app.db.unfollow(&follower, &followed)).await?;
    Ok(StatusCode::NO_CONTENT)
}
