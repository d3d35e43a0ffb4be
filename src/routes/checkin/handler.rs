use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    AppState,
    error::AppResult,
    models::{CheckInAttempt, CheckInRequest},
    utils::{Claims, success_to_api_response},
};

/// 拒绝也是正常结果，`success=false` 并给出原因
#[axum::debug_handler]
pub async fn check_in(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CheckInRequest>,
) -> AppResult<impl IntoResponse> {
    let result = state
        .game
        .check_in(CheckInAttempt {
            user_id: claims.sub,
            location_id: req.location_id,
            coordinates: req.coordinates,
            timestamp: Utc::now(),
        })
        .await?;
    Ok(success_to_api_response(result))
}

#[axum::debug_handler]
pub async fn my_check_ins(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let check_ins = state.game.check_ins(&claims.sub).await?;
    Ok(success_to_api_response(check_ins))
}
