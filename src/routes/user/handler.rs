use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{AuthResponse, LoginRequest, NewUser, RegisterRequest, User},
    utils::{Claims, generate_token, hash_password, success_to_api_response, verify_password},
};

use super::model::RefreshTokenResponse;

fn auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let is_admin = state.config.is_admin(&user.email);
    let (token, expires_at) = generate_token(&user.user_id, is_admin, &state.config)
        .map_err(|e| {
            tracing::error!("Failed to sign token: {}", e);
            AppError::Internal("Failed to generate token".to_string())
        })?;
    Ok(AuthResponse {
        user_id: user.user_id.clone(),
        display_name: user.display_name.clone(),
        token,
        expires_at,
        is_admin,
    })
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let req = req.validated()?;
    let store = state.game.store();

    if store.find_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::UserExists);
    }

    let password_hash = hash_password(&req.password, state.config.bcrypt_cost).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        AppError::Internal("Failed to create user".to_string())
    })?;

    let user = store
        .create_user(NewUser {
            user_id: uuid::Uuid::new_v4().to_string(),
            email: req.email,
            display_name: req.display_name,
            photo_url: req.photo_url,
            password_hash: Some(password_hash),
        })
        .await?;
    tracing::info!("Registered user {}", user.user_id);

    Ok((StatusCode::CREATED, success_to_api_response(auth_response(&state, &user)?)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let invalid = || AppError::AuthFailed("Invalid email or password".to_string());

    let email = req.email.trim().to_lowercase();
    let user = state
        .game
        .store()
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let Some(hash) = user.password_hash.as_deref() else {
        return Err(invalid());
    };
    match verify_password(&req.password, hash) {
        Ok(true) => {}
        Ok(false) => return Err(invalid()),
        Err(e) => {
            tracing::error!("Failed to verify password for {}: {}", user.user_id, e);
            return Err(invalid());
        }
    }

    Ok(success_to_api_response(auth_response(&state, &user)?))
}

#[axum::debug_handler]
pub async fn get_me(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let user = state
        .game
        .store()
        .find_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn refresh_token(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let (token, expires_at) =
        generate_token(&claims.sub, claims.is_admin, &state.config).map_err(|e| {
            tracing::error!("Failed to refresh token: {}", e);
            AppError::Internal("Failed to refresh token".to_string())
        })?;
    Ok(success_to_api_response(RefreshTokenResponse { token, expires_at }))
}

/// `me` 表示当前用户
#[axum::debug_handler]
pub async fn stats(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = if user_id == "me" { claims.sub } else { user_id };
    let progress = state
        .game
        .progress(&user_id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(success_to_api_response(progress))
}
