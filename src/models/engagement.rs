use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::models::SortDirection;
use crate::services::listing::{Listable, SortField};
use crate::validation::{Validate, Validator};

/// Engagement format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementFormat {
    Workshop,
    Keynote,
    Training,
    Consulting,
}

impl EngagementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementFormat::Workshop => "workshop",
            EngagementFormat::Keynote => "keynote",
            EngagementFormat::Training => "training",
            EngagementFormat::Consulting => "consulting",
        }
    }
}

/// Engagement (workshop, talk, training or consulting offer)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Engagement {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub description: String,
    pub format: String,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub booking_url: Option<String>,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub is_featured: bool,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateEngagementRequest {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub format: EngagementFormat,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub booking_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEngagementRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub format: Option<EngagementFormat>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub booking_url: Option<String>,
    pub is_published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i64>,
}

impl Validate for CreateEngagementRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.required("title", &self.title, 200);
        v.slug("slug", self.slug.as_deref());
        v.max_len("summary", Some(&self.summary), 500);
        v.max_len("description", Some(&self.description), 20_000);
        v.max_len("duration", self.duration.as_deref(), 100);
        v.max_len("location", self.location.as_deref(), 200);
        v.url("image_url", self.image_url.as_deref());
        v.url("booking_url", self.booking_url.as_deref());
        v.non_negative("sort_order", Some(self.sort_order));
        if self.published_at.is_some() && !self.is_published {
            v.add("published_at", "A publish date requires is_published");
        }
        v.finish()
    }
}

impl Validate for UpdateEngagementRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        if let Some(title) = &self.title {
            v.required("title", title, 200);
        }
        v.slug("slug", self.slug.as_deref());
        v.max_len("summary", self.summary.as_deref(), 500);
        v.max_len("description", self.description.as_deref(), 20_000);
        v.max_len("duration", self.duration.as_deref(), 100);
        v.max_len("location", self.location.as_deref(), 200);
        v.url("image_url", self.image_url.as_deref());
        v.url("booking_url", self.booking_url.as_deref());
        v.non_negative("sort_order", self.sort_order);
        if self.published_at.is_some() && self.is_published == Some(false) {
            v.add("published_at", "A publish date requires is_published");
        }
        v.finish()
    }
}

impl Listable for Engagement {
    fn title(&self) -> &str {
        &self.title
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.title.as_str(),
            self.summary.as_str(),
            self.description.as_str(),
            self.format.as_str(),
        ]
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
