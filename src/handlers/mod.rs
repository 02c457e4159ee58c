pub mod admin;
pub mod auth;
pub mod blog;
pub mod catalog;
pub mod log;
pub mod message;
pub mod tag;

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::{AppError, Result};
use crate::models::{ClientInfo, CurrentUser, NewLogEntry, UploadedFile};
use crate::services::LogService;
use crate::AppState;

/// Record an admin action in the application log
pub(crate) async fn audit(
    state: &AppState,
    user: &CurrentUser,
    client: &ClientInfo,
    action: &str,
    details: serde_json::Value,
) {
    LogService::record(
        &state.db,
        NewLogEntry::user_action(action)
            .actor(user)
            .client(client)
            .details(details),
    )
    .await;
}

/// Text fields and files of a multipart body
#[derive(Debug, Default)]
pub(crate) struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Collect every part; parts named `file_field` (or `file_field[]`) are files
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self> {
        let array_field = format!("{}[]", file_field);
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to process multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == file_field || name == array_field {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                form.files.push(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}
