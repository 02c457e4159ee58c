use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde_json::json;

use crate::error::{ApiResponse, AppError, Result};
use crate::handlers::audit;
use crate::models::{
    AppLogResponse, ClientInfo, CurrentUser, LogQuery, Paginated, PruneLogsQuery,
    PruneLogsResponse,
};
use crate::services::LogService;
use crate::AppState;

/// GET /api/admin/logs
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ApiResponse<Paginated<AppLogResponse>>>> {
    let page = LogService::list(&state.db, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// DELETE /api/admin/logs?older_than_days=N
pub async fn prune_logs(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Query(query): Query<PruneLogsQuery>,
) -> Result<Json<ApiResponse<PruneLogsResponse>>> {
    if query.older_than_days == 0 {
        return Err(AppError::BadRequest(
            "older_than_days must be at least 1".to_string(),
        ));
    }

    let deleted = LogService::prune_older_than(&state.db, query.older_than_days).await?;
    audit(
        &state,
        &current_user,
        &client,
        "logs.prune",
        json!({ "older_than_days": query.older_than_days, "deleted": deleted }),
    )
    .await;
    Ok(Json(ApiResponse::success(PruneLogsResponse { deleted })))
}
