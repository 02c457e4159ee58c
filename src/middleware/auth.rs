use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::{CurrentUser, UserRole};
use crate::services::AuthService;
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))
}

/// Resolve the bearer token to an active user whose token version still matches
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let token = bearer_token(headers)?;
    let claims = AuthService::validate_token(token, &state.config)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    let row: Option<(String, String, bool, i64)> =
        sqlx::query_as("SELECT email, role, is_active, token_version FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(state.db.pool())
            .await?;
    let (email, role, is_active, token_version) =
        row.ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

    if !is_active {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    if token_version != claims.ver {
        return Err(AppError::Unauthorized("Session expired".to_string()));
    }

    Ok(CurrentUser {
        id: claims.sub,
        email,
        role: UserRole::from_str(&role),
    })
}

/// Authentication middleware
/// Extracts and validates JWT from Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current_user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(current_user);
    Ok(next.run(request).await)
}

/// Admin middleware; every failure is reported as 401
pub async fn admin_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current_user = authenticate(&state, request.headers()).await?;

    if !current_user.is_admin() {
        tracing::warn!("Non-admin {} denied admin access", current_user.email);
        return Err(AppError::Unauthorized("Admin access required".to_string()));
    }

    request.extensions_mut().insert(current_user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[tokio::test]
    async fn test_authenticate_future_is_send() {
        let (state, _dir) = crate::tests::test_state().await;
        let headers = HeaderMap::new();
        let fut = authenticate(&state, &headers);
        assert_send(&fut);
        assert!(matches!(fut.await, Err(AppError::Unauthorized(_))));
    }
}
