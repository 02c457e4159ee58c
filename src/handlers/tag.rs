use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::json;

use crate::error::{ApiResponse, Result};
use crate::handlers::audit;
use crate::models::{ClientInfo, CurrentUser, Tag, TagWithCount, UpdateTagRequest};
use crate::services::TagService;
use crate::AppState;

/// Tags with their post counts
/// GET /api/tags, GET /api/admin/tags
pub async fn list_tags(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TagWithCount>>>> {
    let tags = TagService::list_with_counts(&state.db).await?;
    Ok(Json(ApiResponse::success(tags)))
}

/// PUT /api/admin/tags/:id
pub async fn update_tag(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UpdateTagRequest>,
) -> Result<Json<ApiResponse<Tag>>> {
    let tag = TagService::update(&state.db, &id, req).await?;
    // Posts embed their tags.
    state.cache.posts.invalidate().await;
    audit(
        &state,
        &current_user,
        &client,
        "tag.update",
        json!({ "id": id, "slug": tag.slug }),
    )
    .await;
    Ok(Json(ApiResponse::success(tag)))
}

/// DELETE /api/admin/tags/:id
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    TagService::delete(&state.db, &id).await?;
    state.cache.posts.invalidate().await;
    audit(&state, &current_user, &client, "tag.delete", json!({ "id": id })).await;
    Ok(Json(ApiResponse::<()>::success_message("Tag deleted")))
}
