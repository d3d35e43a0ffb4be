use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    middleware::{admin_middleware, auth_middleware, log_errors},
    routes::{admin, checkin, health, leaderboard, location, user},
};

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/users/register", post(user::register))
        .route("/users/login", post(user::login))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(user::get_me))
        .route("/users/refresh-token", post(user::refresh_token))
        .route("/users/{user_id}/stats", get(user::stats))
        .route("/locations", get(location::list_locations))
        .route("/locations/{location_id}", get(location::get_location))
        .route("/checkins", post(checkin::check_in))
        .route("/checkins/me", get(checkin::my_check_ins))
        .route("/leaderboard", get(leaderboard::leaderboard))
        .route("/badges", get(leaderboard::badges))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/locations/enhance", post(admin::enhance_all_locations))
        .route(
            "/admin/locations/{location_id}/enhance",
            post(admin::enhance_location),
        )
        .route("/admin/coordinates/validate", post(admin::validate_coordinates))
        .route("/admin/jobs", post(admin::create_job).get(admin::list_jobs))
        .route("/admin/jobs/run", post(admin::run_jobs))
        .route(
            "/admin/jobs/{job_id}",
            get(admin::job_status).delete(admin::cancel_job),
        )
        // 后加的层先执行：先认证再检查管理员
        .route_layer(from_fn(admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
}

/// 完整 API，挂在配置的前缀下
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .merge(admin_routes(&state));

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(log_errors)),
        )
        .with_state(state)
}
