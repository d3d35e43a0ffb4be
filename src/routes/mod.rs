pub mod admin;
pub mod checkin;
pub mod leaderboard;
pub mod location;
pub mod user;

use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{AppState, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub jobs_running: bool,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs_running: state.jobs.is_running(),
    })
}
