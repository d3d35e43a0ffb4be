use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    AppState,
    error::{AppError, AppResult},
    geo::Coordinate,
    jobs::JobState,
    utils::success_to_api_response,
};

use super::model::{
    CreateJobResponse, EnhanceAllResponse, EnhanceLocationResponse, RunJobsResponse,
    ValidateCoordinatesRequest,
};

#[axum::debug_handler]
pub async fn enhance_location(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let store = state.game.store();
    let location = store
        .find_location(&location_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Location not found".to_string()))?;

    let enhancement = state.enhancer.enhance(&location).await;
    if enhancement.is_empty() {
        let reasons: Vec<String> = enhancement
            .fragment_errors
            .iter()
            .map(|e| format!("{}: {}", e.fragment, e.reason))
            .collect();
        return Err(AppError::AiUnavailable(format!(
            "AI enhancement unavailable ({})",
            reasons.join("; ")
        )));
    }

    let location = store
        .save_enhancement(&location_id, &enhancement, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("Location not found".to_string()))?;
    tracing::info!("Enhanced location {}", location_id);

    Ok(success_to_api_response(EnhanceLocationResponse {
        location,
        enhancement,
    }))
}

#[axum::debug_handler]
pub async fn enhance_all_locations(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let store = state.game.store();
    let locations = store.list_locations().await?;
    let results = state.enhancer.enhance_all(&locations).await;

    let mut response = EnhanceAllResponse {
        enhanced: Vec::new(),
        failed: Vec::new(),
        fragment_errors: Vec::new(),
    };
    let now = Utc::now();
    for (location_id, enhancement) in results {
        if enhancement.is_empty() {
            response.failed.push(location_id);
        } else {
            store.save_enhancement(&location_id, &enhancement, now).await?;
            response.enhanced.push(location_id);
        }
        response.fragment_errors.extend(enhancement.fragment_errors);
    }
    tracing::info!(
        "Enhanced {} locations, {} failed",
        response.enhanced.len(),
        response.failed.len()
    );

    Ok(success_to_api_response(response))
}

#[axum::debug_handler]
pub async fn validate_coordinates(
    State(state): State<AppState>,
    Json(req): Json<ValidateCoordinatesRequest>,
) -> AppResult<impl IntoResponse> {
    let coordinates = Coordinate::new(req.lat, req.lng);
    coordinates
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let validation = state
        .enhancer
        .validate_coordinates(coordinates, &req.name)
        .await;
    Ok(success_to_api_response(validation))
}

#[axum::debug_handler]
pub async fn create_job(State(state): State<AppState>) -> impl IntoResponse {
    let job_id = state.jobs.create_location_enhancement_job().await;
    (
        StatusCode::CREATED,
        success_to_api_response(CreateJobResponse { job_id }),
    )
}

#[axum::debug_handler]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(state.jobs.all().await)
}

#[axum::debug_handler]
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .jobs
        .status(&job_id)
        .await
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    Ok(success_to_api_response(job))
}

#[axum::debug_handler]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if state.jobs.cancel(&job_id).await {
        return Ok(success_to_api_response(job_id));
    }
    match state.jobs.status(&job_id).await {
        Some(job) if job.status != JobState::Pending => Err(AppError::Validation(
            "Only pending jobs can be cancelled".to_string(),
        )),
        _ => Err(AppError::NotFound("Job not found".to_string())),
    }
}

#[axum::debug_handler]
pub async fn run_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let processed = state.jobs.process_pending_jobs().await;
    success_to_api_response(RunJobsResponse { processed })
}
