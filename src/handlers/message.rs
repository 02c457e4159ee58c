use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;

use crate::error::{ApiResponse, AppError, Result};
use crate::handlers::{audit, MultipartForm};
use crate::models::{
    BatchResult, BatchStatusRequest, ClientInfo, ContactMessage, ContactMessageResponse,
    ContactSubmission, CurrentUser, ExportRequest, IdListRequest, MessageQuery, NewLogEntry,
    Paginated, UpdateMessageStatusRequest, UploadedFile,
};
use crate::services::{export, LogService, MessageService};
use crate::AppState;

async fn read_submission(
    state: &AppState,
    request: Request,
) -> Result<(ContactSubmission, Vec<UploadedFile>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let Json(submission) = Json::<ContactSubmission>::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok((submission, Vec::new()));
    }

    let multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = MultipartForm::read(multipart, "attachments").await?;
    let text = |name: &str| form.field(name).unwrap_or_default().to_string();

    let submission = ContactSubmission {
        full_name: text("full_name"),
        email: text("email"),
        purpose: text("purpose"),
        message: text("message"),
    };
    Ok((submission, form.files))
}

/// Public contact form, JSON or multipart with `attachments`
/// POST /api/contact
pub async fn submit_contact(
    State(state): State<AppState>,
    client: ClientInfo,
    request: Request,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let (submission, files) = read_submission(&state, request).await?;

    let created = MessageService::submit(
        &state.db,
        state.storage.as_ref(),
        &state.config.uploads,
        submission,
        files,
    )
    .await?;

    LogService::record(
        &state.db,
        NewLogEntry::system("contact.submit")
            .client(&client)
            .details(json!({
                "id": created.message.id,
                "purpose": created.message.purpose,
                "attachments": created.attachments.len(),
            })),
    )
    .await;

    Ok(Json(ApiResponse {
        code: 0,
        message: "Message received".to_string(),
        data: Some(json!({ "id": created.message.id })),
    }))
}

/// GET /api/admin/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<ApiResponse<Paginated<ContactMessageResponse>>>> {
    let page = MessageService::list(&state.db, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Message detail; marks an unread message as read
/// GET /api/admin/messages/:id
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ContactMessageResponse>>> {
    let message = MessageService::open(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(message)))
}

/// PATCH /api/admin/messages/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UpdateMessageStatusRequest>,
) -> Result<Json<ApiResponse<ContactMessage>>> {
    let message = MessageService::set_status(&state.db, &id, req.status).await?;
    audit(
        &state,
        &current_user,
        &client,
        "message.status",
        json!({ "id": id, "status": message.status }),
    )
    .await;
    Ok(Json(ApiResponse::success(message)))
}

/// DELETE /api/admin/messages/:id
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    MessageService::delete(&state.db, state.storage.as_ref(), &id).await?;
    audit(&state, &current_user, &client, "message.delete", json!({ "id": id })).await;
    Ok(Json(ApiResponse::<()>::success_message("Message deleted")))
}

/// POST /api/admin/messages/batch/status
pub async fn batch_status(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Json(req): Json<BatchStatusRequest>,
) -> Result<Json<ApiResponse<BatchResult>>> {
    let result = MessageService::batch_status(&state.db, &req.ids, req.status).await?;
    audit(
        &state,
        &current_user,
        &client,
        "message.batch_status",
        json!({ "status": req.status.as_str(), "result": &result }),
    )
    .await;
    Ok(Json(ApiResponse::success(result)))
}

/// POST /api/admin/messages/batch/delete
pub async fn batch_delete(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Json(req): Json<IdListRequest>,
) -> Result<Json<ApiResponse<BatchResult>>> {
    let result = MessageService::batch_delete(&state.db, state.storage.as_ref(), &req.ids).await?;
    audit(
        &state,
        &current_user,
        &client,
        "message.batch_delete",
        json!({ "result": &result }),
    )
    .await;
    Ok(Json(ApiResponse::success(result)))
}

/// Download selected messages as CSV or JSON
/// POST /api/admin/messages/export
pub async fn export_messages(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Json(req): Json<ExportRequest>,
) -> Result<Response> {
    let messages = MessageService::for_export(&state.db, req.ids.as_deref(), &req.filters).await?;
    let file = export::render(&messages, req.format, req.include_attachments, Utc::now())?;

    audit(
        &state,
        &current_user,
        &client,
        "message.export",
        json!({ "format": req.format.extension(), "count": messages.len() }),
    )
    .await;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.body,
    )
        .into_response())
}
