use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde_json::json;

use crate::error::{ApiResponse, AppError, Result};
use crate::handlers::{audit, MultipartForm};
use crate::models::{
    BlogPostResponse, ClientInfo, CreatePostRequest, CurrentUser, ListQuery, Media, Paginated,
    PublishRequest, ReorderMediaRequest, UpdateMediaRequest, UpdatePostRequest, UploadOutcome,
};
use crate::services::{listing, MediaService, PostService};
use crate::validation::FieldError;
use crate::AppState;

/// Published posts, filtered and paginated
/// GET /api/blogs
///
/// A failed load renders as an empty page.
pub async fn list_published(
    State(state): State<AppState>,
    Query(mut query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<BlogPostResponse>>>> {
    query.status = None;

    let posts = match PostService::published(&state.db, &state.cache).await {
        Ok(posts) => posts,
        Err(e) => {
            tracing::error!("Failed to load published posts: {}", e);
            return Ok(Json(ApiResponse::success(Paginated::empty(
                query.page(),
                query.per_page(),
            ))));
        }
    };

    let page = listing::apply(&posts, &query)?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/blogs/:slug
pub async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<BlogPostResponse>>> {
    let post = PostService::get_published_by_slug(&state.db, &slug).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// GET /api/admin/blogs
pub async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<BlogPostResponse>>>> {
    let posts = PostService::list_all(&state.db).await?;
    let page = listing::apply(&posts, &query)?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/admin/blogs/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<BlogPostResponse>>> {
    let post = PostService::get(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// POST /api/admin/blogs
pub async fn create_post(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<ApiResponse<BlogPostResponse>>> {
    let post = PostService::create(&state.db, &state.cache, req).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.create",
        json!({ "id": post.post.id, "slug": post.post.slug }),
    )
    .await;
    Ok(Json(ApiResponse::success(post)))
}

/// PUT /api/admin/blogs/:id
pub async fn update_post(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<ApiResponse<BlogPostResponse>>> {
    let post = PostService::update(&state.db, &state.cache, &id, req).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.update",
        json!({ "id": id, "slug": post.post.slug }),
    )
    .await;
    Ok(Json(ApiResponse::success(post)))
}

/// PATCH /api/admin/blogs/:id
pub async fn publish_post(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<ApiResponse<BlogPostResponse>>> {
    let post = PostService::set_published(&state.db, &state.cache, &id, req).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.publish",
        json!({ "id": id, "is_published": post.post.is_published }),
    )
    .await;
    Ok(Json(ApiResponse::success(post)))
}

/// DELETE /api/admin/blogs/:id
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    let post = PostService::delete(&state.db, state.storage.as_ref(), &state.cache, &id).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.delete",
        json!({ "id": id, "slug": post.slug }),
    )
    .await;
    Ok(Json(ApiResponse::<()>::success_message("Post deleted")))
}

/// Attach images and videos to a post
/// POST /api/admin/blogs/upload (multipart: post_id, files)
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadOutcome>>> {
    let form = MultipartForm::read(multipart, "files").await?;
    let post_id = form
        .field("post_id")
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::Validation(vec![FieldError::new("post_id", "Post id is required")])
        })?;

    let outcome = MediaService::upload_many(
        &state.db,
        state.storage.as_ref(),
        &state.cache,
        &state.config.uploads,
        &post_id,
        form.files,
    )
    .await?;

    audit(
        &state,
        &current_user,
        &client,
        "blog.media.upload",
        json!({
            "post_id": post_id,
            "uploaded": outcome.uploaded.len(),
            "rejected": outcome.errors.len(),
        }),
    )
    .await;
    Ok(Json(ApiResponse::success(outcome)))
}

/// PUT /api/admin/blogs/:id/media/reorder
pub async fn reorder_media(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<ReorderMediaRequest>,
) -> Result<Json<ApiResponse<Vec<Media>>>> {
    let media = MediaService::reorder(&state.db, &state.cache, &id, &req.media_ids).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.media.reorder",
        json!({ "post_id": id, "media_ids": req.media_ids }),
    )
    .await;
    Ok(Json(ApiResponse::success(media)))
}

/// PUT /api/admin/blogs/:id/media/:media_id
pub async fn update_media(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path((id, media_id)): Path<(String, String)>,
    Json(req): Json<UpdateMediaRequest>,
) -> Result<Json<ApiResponse<Media>>> {
    let media = MediaService::update(&state.db, &state.cache, &id, &media_id, req).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.media.update",
        json!({ "post_id": id, "media_id": media_id, "is_featured": media.is_featured }),
    )
    .await;
    Ok(Json(ApiResponse::success(media)))
}

/// DELETE /api/admin/blogs/:id/media/:media_id
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path((id, media_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>> {
    MediaService::delete(&state.db, state.storage.as_ref(), &state.cache, &id, &media_id).await?;
    audit(
        &state,
        &current_user,
        &client,
        "blog.media.delete",
        json!({ "post_id": id, "media_id": media_id }),
    )
    .await;
    Ok(Json(ApiResponse::<()>::success_message("Media deleted")))
}
