use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::json;

use crate::error::{ApiResponse, Result};
use crate::handlers::audit;
use crate::models::{ClientInfo, CurrentUser, UpdateUserRoleRequest, UpdateUserStatusRequest, UserResponse};
use crate::services::UserService;
use crate::AppState;

/// List all users
/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>> {
    let users = UserService::list_users(&state.db).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// Change a user's role
/// PUT /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRoleRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = UserService::update_user_role(&state.db, &current_user.id, &id, req.role).await?;
    audit(
        &state,
        &current_user,
        &client,
        "user.role",
        json!({ "user_id": id, "role": user.role }),
    )
    .await;
    Ok(Json(ApiResponse::success(user)))
}

/// Update user status (enable/disable)
/// PUT /api/admin/users/:id/status
pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user =
        UserService::update_user_status(&state.db, &current_user.id, &id, req.is_active).await?;
    audit(
        &state,
        &current_user,
        &client,
        "user.status",
        json!({ "user_id": id, "is_active": user.is_active }),
    )
    .await;
    Ok(Json(ApiResponse::success(user)))
}
