use axum::{extract::State, http::HeaderMap, response::IntoResponse, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    ClientInfo, CreateUserRequest, CurrentUser, LogType, LoginRequest, NewLogEntry, UserResponse,
};
use crate::services::{AuthService, LogService, UserService};
use crate::AppState;

const REFRESH_COOKIE: &str = "lt_refresh";
const REFRESH_COOKIE_PATH: &str = "/api/auth";

fn refresh_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.jwt.cookie_secure)
        .path(REFRESH_COOKIE_PATH)
        .build()
}

/// Register a new user
/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = AuthService::register(&state.db, &state.config, req).await?;

    LogService::record(
        &state.db,
        NewLogEntry::user_action("auth.register")
            .client(&client)
            .details(json!({ "user_id": user.id, "email": user.email, "role": user.role })),
    )
    .await;

    Ok(Json(ApiResponse::success(user)))
}

/// Login user
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let response = match AuthService::login(&state.db, &state.config, req).await {
        Ok(response) => response,
        Err(e) => {
            LogService::record(
                &state.db,
                NewLogEntry::new(LogType::Error, "auth.login_failed")
                    .client(&client)
                    .details(json!({ "email": email })),
            )
            .await;
            return Err(e);
        }
    };

    LogService::record(
        &state.db,
        NewLogEntry::new(LogType::Success, "auth.login")
            .client(&client)
            .details(json!({ "user_id": response.user.id, "email": response.user.email })),
    )
    .await;

    let jar = match response.refresh_token.as_ref() {
        Some(token) => CookieJar::new().add(refresh_cookie(&state, token.clone())),
        None => CookieJar::new(),
    };

    Ok((jar, Json(ApiResponse::success(response))))
}

/// Refresh access token
/// POST /api/auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            headers
                .get("X-Refresh-Token")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let response = AuthService::refresh_token(&state.db, &state.config, &refresh_token).await?;

    let jar = match response.refresh_token.as_ref() {
        Some(token) => jar.add(refresh_cookie(&state, token.clone())),
        None => jar,
    };

    Ok((jar, Json(ApiResponse::success(response))))
}

/// Logout user
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    AuthService::logout(&state.db, &current_user.id).await?;
    Ok((
        jar.remove(refresh_cookie(&state, String::new())),
        Json(ApiResponse::<()>::success_message("Logged out successfully")),
    ))
}

/// Current user profile
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = UserService::get_profile(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(user)))
}
