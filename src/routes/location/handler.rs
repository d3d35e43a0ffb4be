use axum::{
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    utils::{Claims, success_to_api_response},
};

use super::model::LocationQuery;

#[axum::debug_handler]
pub async fn list_locations(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> AppResult<impl IntoResponse> {
    let position = query.position()?;
    let mut views = state.game.locations_for(&claims.sub, position).await?;

    if let (Some(within), Some(_)) = (query.within, position) {
        let within = within.min(state.config.max_check_in_radius);
        views.retain(|view| view.distance.is_some_and(|d| d <= within));
        views.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    }

    Ok(success_to_api_response(views))
}

#[axum::debug_handler]
pub async fn get_location(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let location = state
        .game
        .location_for(&claims.sub, &location_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Location not found".to_string()))?;
    Ok(success_to_api_response(location))
}
