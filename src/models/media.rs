use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::validation::{Validate, Validator};

/// Kind of media attached to a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Media record linked to a blog post
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Media {
    pub id: String,
    pub post_id: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub public_url: String,
    pub file_type: String,
    pub mime_type: String,
    pub file_name: String,
    pub size: i64,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub is_featured: bool,
    pub sort_order: i64,
    pub created_at: String,
}

/// A file received from a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A file that was skipped during a multi-file upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadError {
    pub file_name: String,
    pub error: String,
}

/// Result of a multi-file upload
#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub uploaded: Vec<Media>,
    pub errors: Vec<UploadError>,
}

/// Update media metadata request
#[derive(Debug, Deserialize)]
pub struct UpdateMediaRequest {
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i64>,
}

impl Validate for UpdateMediaRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.max_len("alt_text", self.alt_text.as_deref(), 300);
        v.max_len("caption", self.caption.as_deref(), 1000);
        v.non_negative("sort_order", self.sort_order);
        v.finish()
    }
}

/// Reorder request: media ids in their new display order
#[derive(Debug, Deserialize)]
pub struct ReorderMediaRequest {
    pub media_ids: Vec<String>,
}
