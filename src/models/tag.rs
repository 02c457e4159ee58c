use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::validation::{Validate, Validator};

/// Tag model
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub created_at: String,
}

/// Tag with the number of published posts carrying it
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TagWithCount {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub post_count: i64,
}

/// Update tag request; the slug follows the new name
#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl Validate for UpdateTagRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        if let Some(name) = &self.name {
            v.required("name", name, 50);
        }
        v.hex_color("color", self.color.as_deref().filter(|c| !c.is_empty()));
        v.finish()
    }
}
