use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::models::{Media, Tag};
use crate::services::listing::Listable;
use crate::validation::{Validate, Validator};

pub const MAX_TAGS_PER_POST: usize = 20;

/// Blog post row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub is_featured: bool,
    pub reading_time: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Blog post with its tags (in submitted order) and media (in display order)
#[derive(Debug, Clone, Serialize)]
pub struct BlogPostResponse {
    #[serde(flatten)]
    pub post: BlogPost,
    pub tags: Vec<Tag>,
    pub media: Vec<Media>,
}

/// Create post request
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    pub reading_time: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Update post request; absent fields keep their stored value
///
/// The slug only changes when `slug` is given or `regenerate_slug` is set.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default)]
    pub regenerate_slug: bool,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: Option<bool>,
    pub reading_time: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl Listable for BlogPostResponse {
    fn title(&self) -> &str {
        &self.post.title
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.post.title.as_str(),
            self.post.excerpt.as_str(),
            self.post.content.as_str(),
        ]
    }

    fn is_published(&self) -> bool {
        self.post.is_published
    }

    fn published_at(&self) -> Option<&str> {
        self.post.published_at.as_deref()
    }

    fn is_featured(&self) -> bool {
        self.post.is_featured
    }

    fn created_at(&self) -> &str {
        &self.post.created_at
    }

    fn updated_at(&self) -> &str {
        &self.post.updated_at
    }

    fn tag_slugs(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.slug.as_str()).collect()
    }

    fn reading_time(&self) -> Option<i64> {
        Some(self.post.reading_time)
    }
}

fn validate_tags(v: &mut Validator, tags: &[String]) {
    if tags.len() > MAX_TAGS_PER_POST {
        v.add(
            "tags",
            format!("At most {} tags per post", MAX_TAGS_PER_POST),
        );
    }
    if tags.iter().any(|t| t.trim().is_empty()) {
        v.add("tags", "Tag names must not be empty");
    }
    if tags.iter().any(|t| t.chars().count() > 50) {
        v.add("tags", "Tag names must be at most 50 characters");
    }
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.required("title", &self.title, 200);
        v.slug("slug", self.slug.as_deref());
        v.max_len("excerpt", self.excerpt.as_deref(), 500);
        v.required("content", &self.content, 200_000);
        v.url("cover_image_url", self.cover_image_url.as_deref());
        if matches!(self.reading_time, Some(m) if m < 1) {
            v.add("reading_time", "Reading time must be at least 1 minute");
        }
        if self.published_at.is_some() && !self.is_published {
            v.add("published_at", "A publish date requires is_published");
        }
        validate_tags(&mut v, &self.tags);
        v.finish()
    }
}

impl Validate for UpdatePostRequest {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        if let Some(title) = &self.title {
            v.required("title", title, 200);
        }
        v.slug("slug", self.slug.as_deref());
        v.max_len("excerpt", self.excerpt.as_deref(), 500);
        if let Some(content) = &self.content {
            v.required("content", content, 200_000);
        }
        v.url("cover_image_url", self.cover_image_url.as_deref());
        if matches!(self.reading_time, Some(m) if m < 1) {
            v.add("reading_time", "Reading time must be at least 1 minute");
        }
        if self.published_at.is_some() && self.is_published == Some(false) {
            v.add("published_at", "A publish date requires is_published");
        }
        if let Some(tags) = &self.tags {
            validate_tags(&mut v, tags);
        }
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn create_request() -> CreatePostRequest {
        CreatePostRequest {
            title: "Hello, World!".to_string(),
            slug: None,
            excerpt: None,
            content: "Body".to_string(),
            cover_image_url: None,
            is_published: false,
            published_at: None,
            is_featured: false,
            reading_time: None,
            tags: vec!["Rust".to_string()],
        }
    }

    #[test]
    fn test_valid_create_request() {
        assert!(create_request().validate().is_ok());
    }

    #[test]
    fn test_field_errors_reported_together() {
        let mut req = create_request();
        req.title = String::new();
        req.slug = Some("Not A Slug".to_string());
        req.tags = vec!["  ".to_string()];
        req.published_at = Some(Utc::now());

        match req.validate() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"title"));
                assert!(fields.contains(&"slug"));
                assert!(fields.contains(&"tags"));
                assert!(fields.contains(&"published_at"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_update_is_valid() {
        assert!(UpdatePostRequest::default().validate().is_ok());
    }
}
