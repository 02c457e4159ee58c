//! Handlers shared by books, engagements and products.
//!
//! Each route is instantiated per type, e.g. `get(catalog::list_published::<BookService>)`.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::json;

use crate::error::{ApiResponse, Result};
use crate::handlers::audit;
use crate::models::{ClientInfo, CurrentUser, ListQuery, Paginated, PublishRequest};
use crate::services::listing::{self, Listable};
use crate::services::CatalogService;
use crate::AppState;

fn action<S: CatalogService>(verb: &str) -> String {
    format!("{}.{}", S::SCOPE.label().to_lowercase(), verb)
}

/// Published items, filtered and paginated; a failed load renders as an empty page
pub async fn list_published<S: CatalogService>(
    State(state): State<AppState>,
    Query(mut query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<S::Item>>>> {
    query.status = None;

    let items = match S::published(&state.db, &state.cache).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("Failed to load published {}: {}", S::SCOPE.table(), e);
            return Ok(Json(ApiResponse::success(Paginated::empty(
                query.page(),
                query.per_page(),
            ))));
        }
    };

    let page = listing::apply(&items, &query)?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_published<S: CatalogService>(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<S::Item>>> {
    let item = S::get_published_by_slug(&state.db, &slug).await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn list_all<S: CatalogService>(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Paginated<S::Item>>>> {
    let items = S::list_all(&state.db).await?;
    let page = listing::apply(&items, &query)?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_item<S: CatalogService>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<S::Item>>> {
    let item = S::get(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn create_item<S: CatalogService>(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Json(req): Json<S::Create>,
) -> Result<Json<ApiResponse<S::Item>>> {
    let item = S::create(&state.db, &state.cache, req).await?;
    audit(&state, &current_user, &client, &action::<S>("create"), json!({ "title": item.title() })).await;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn update_item<S: CatalogService>(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<S::Update>,
) -> Result<Json<ApiResponse<S::Item>>> {
    let item = S::update(&state.db, &state.cache, &id, req).await?;
    audit(&state, &current_user, &client, &action::<S>("update"), json!({ "id": id })).await;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn publish_item<S: CatalogService>(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<ApiResponse<S::Item>>> {
    let is_published = req.is_published;
    let item = S::set_published(&state.db, &state.cache, &id, req).await?;
    audit(
        &state,
        &current_user,
        &client,
        &action::<S>("publish"),
        json!({ "id": id, "is_published": is_published }),
    )
    .await;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn delete_item<S: CatalogService>(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    S::delete(&state.db, &state.cache, &id).await?;
    audit(&state, &current_user, &client, &action::<S>("delete"), json!({ "id": id })).await;
    Ok(Json(ApiResponse::<()>::success_message(&format!(
        "{} deleted",
        S::SCOPE.label()
    ))))
}
