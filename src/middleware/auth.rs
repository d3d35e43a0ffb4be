use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, verify_token},
};

/// 校验 Bearer token，成功后把 Claims 放进请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() else {
        return unauthorized("Missing bearer token");
    };

    match verify_token(bearer.token(), &state.config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Rejected token: {}", e);
            unauthorized("Invalid or expired token")
        }
    }
}

/// 必须放在 auth_middleware 之后
pub async fn admin_middleware(req: Request, next: Next) -> Response {
    let is_admin = req
        .extensions()
        .get::<Claims>()
        .is_some_and(|claims| claims.is_admin);
    if !is_admin {
        return (
            StatusCode::FORBIDDEN,
            error_to_api_response::<()>(
                error_codes::PERMISSION_DENIED,
                "Administrator access required".to_string(),
            ),
        )
            .into_response();
    }
    next.run(req).await
}

fn unauthorized(msg: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        error_to_api_response::<()>(error_codes::AUTH_FAILED, msg.to_string()),
    )
        .into_response()
}
