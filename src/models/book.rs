use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::models::SortDirection;
use crate::services::listing::{Listable, SortField};
use crate::validation::{Validate, Validator};

/// Book model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub author: String,
    pub cover_image_url: Option<String>,
    pub purchase_url: Option<String>,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub is_featured: bool,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub slug: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub cover_image_url: Option<String>,
    pub purchase_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub cover_image_url: Option<String>,
    pub purchase_url: Option<String>,
    pub is_published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i64>,
}

impl Validate for CreateBookRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.required("title", &self.title, 200);
        v.slug("slug", self.slug.as_deref());
        v.max_len("subtitle", self.subtitle.as_deref(), 300);
        v.max_len("description", Some(&self.description), 20_000);
        v.max_len("author", Some(&self.author), 200);
        v.url("cover_image_url", self.cover_image_url.as_deref());
        v.url("purchase_url", self.purchase_url.as_deref());
        v.non_negative("sort_order", Some(self.sort_order));
        if self.published_at.is_some() && !self.is_published {
            v.add("published_at", "A publish date requires is_published");
        }
        v.finish()
    }
}

impl Validate for UpdateBookRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        if let Some(title) = &self.title {
            v.required("title", title, 200);
        }
        v.slug("slug", self.slug.as_deref());
        v.max_len("subtitle", self.subtitle.as_deref(), 300);
        v.max_len("description", self.description.as_deref(), 20_000);
        v.max_len("author", self.author.as_deref(), 200);
        v.url("cover_image_url", self.cover_image_url.as_deref());
        v.url("purchase_url", self.purchase_url.as_deref());
        v.non_negative("sort_order", self.sort_order);
        if self.published_at.is_some() && self.is_published == Some(false) {
            v.add("published_at", "A publish date requires is_published");
        }
        v.finish()
    }
}

impl Listable for Book {
    fn title(&self) -> &str {
        &self.title
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.description.as_str(), self.author.as_str()];
        if let Some(subtitle) = &self.subtitle {
            fields.push(subtitle);
        }
        fields
    }

    fn is_published(&self) -> bool {
        self.is_published
    }

    fn published_at(&self) -> Option<&str> {
        self.published_at.as_deref()
    }

    fn is_featured(&self) -> bool {
        self.is_featured
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn updated_at(&self) -> &str {
        &self.updated_at
    }

    fn sort_order(&self) -> Option<i64> {
        Some(self.sort_order)
    }

    fn default_sort() -> (SortField, SortDirection) {
        (SortField::SortOrder, SortDirection::Asc)
    }
}
