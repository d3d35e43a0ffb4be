use axum::{
    extract::{Extension, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    error::AppResult,
    utils::{Claims, success_to_api_response},
};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[axum::debug_handler]
pub async fn leaderboard(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = state.game.leaderboard(limit, Some(&claims.sub)).await?;
    Ok(success_to_api_response(entries))
}

#[axum::debug_handler]
pub async fn badges(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let badges = state.game.badges_for(&claims.sub).await?;
    Ok(success_to_api_response(badges))
}
