use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::cache::ContentCache;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    BlogPost, BlogPostResponse, CreatePostRequest, PublishRequest, UpdatePostRequest,
};
use crate::services::publish::resolve_published_at;
use crate::services::slug::{claim_slug, unique_slug, SlugScope};
use crate::services::{reading_time, MediaService, TagService};
use crate::storage::StorageProvider;
use crate::validation::{FieldError, Validate};

const EXCERPT_CHARS: usize = 200;

/// Blog post service
pub struct PostService;

impl PostService {
    /// First `EXCERPT_CHARS` characters of the body, cut at a word boundary
    pub fn derive_excerpt(content: &str) -> String {
        let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= EXCERPT_CHARS {
            return flat;
        }

        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        let trimmed = match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}...", trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation()))
    }

    async fn find_row(conn: &mut SqliteConnection, id: &str) -> Result<BlogPost> {
        sqlx::query_as("SELECT * FROM blog_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn load(conn: &mut SqliteConnection, post: BlogPost) -> Result<BlogPostResponse> {
        let tags = TagService::for_post(conn, &post.id).await?;
        let media = MediaService::list_for_post(conn, &post.id).await?;
        Ok(BlogPostResponse { post, tags, media })
    }

    async fn list(db: &Database, published_only: bool) -> Result<Vec<BlogPostResponse>> {
        let posts: Vec<BlogPost> = sqlx::query_as(
            r#"
            SELECT * FROM blog_posts
            WHERE (? = 0 OR is_published = 1)
            ORDER BY COALESCE(published_at, created_at) DESC
            "#,
        )
        .bind(published_only)
        .fetch_all(db.pool())
        .await?;

        let mut tags = TagService::by_post(db, published_only).await?;
        let mut media = MediaService::by_post(db, published_only).await?;

        Ok(posts
            .into_iter()
            .map(|post| BlogPostResponse {
                tags: tags.remove(&post.id).unwrap_or_default(),
                media: media.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect())
    }

    /// Every published post with tags and media; this is what the cache holds
    pub async fn list_published(db: &Database) -> Result<Vec<BlogPostResponse>> {
        Self::list(db, true).await
    }

    /// Published posts through the cache
    pub async fn published(db: &Database, cache: &ContentCache) -> Result<Arc<Vec<BlogPostResponse>>> {
        cache.posts.get_or_refill(|| Self::list_published(db)).await
    }

    /// Drafts included, for the back office
    pub async fn list_all(db: &Database) -> Result<Vec<BlogPostResponse>> {
        Self::list(db, false).await
    }

    pub async fn get(db: &Database, id: &str) -> Result<BlogPostResponse> {
        let mut conn = db.pool().acquire().await?;
        let post = Self::find_row(&mut conn, id).await?;
        Self::load(&mut conn, post).await
    }

    /// A published post by slug; drafts are reported as missing
    pub async fn get_published_by_slug(db: &Database, slug: &str) -> Result<BlogPostResponse> {
        let mut conn = db.pool().acquire().await?;
        let post: BlogPost =
            sqlx::query_as("SELECT * FROM blog_posts WHERE slug = ? AND is_published = 1")
                .bind(slug)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
        Self::load(&mut conn, post).await
    }

    /// Create a post with its tags in one transaction
    pub async fn create(
        db: &Database,
        cache: &ContentCache,
        req: CreatePostRequest,
    ) -> Result<BlogPostResponse> {
        req.validate()?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let timestamp = now.to_rfc3339();

        let mut tx = db.pool().begin().await?;

        let tags = TagService::resolve(tx.as_mut(), &req.tags).await?;
        let slug = match req.slug.as_deref() {
            Some(explicit) => claim_slug(tx.as_mut(), SlugScope::Posts, explicit, None).await?,
            None => unique_slug(tx.as_mut(), SlugScope::Posts, &req.title, None).await?,
        };
        let reading_time = req
            .reading_time
            .unwrap_or_else(|| reading_time::estimate(&req.content));
        let published_at =
            resolve_published_at(None, false, req.is_published, req.published_at, now);
        let excerpt = req
            .excerpt
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| Self::derive_excerpt(&req.content));
        let cover_image_url = req.cover_image_url.filter(|u| !u.is_empty());

        sqlx::query(
            r#"
            INSERT INTO blog_posts (id, title, slug, excerpt, content, cover_image_url,
                is_published, published_at, is_featured, reading_time, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(req.title.trim())
        .bind(&slug)
        .bind(&excerpt)
        .bind(&req.content)
        .bind(&cover_image_url)
        .bind(req.is_published)
        .bind(&published_at)
        .bind(req.is_featured)
        .bind(reading_time)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(tx.as_mut())
        .await?;

        TagService::set_post_tags(tx.as_mut(), &id, &tags).await?;

        let post = Self::find_row(tx.as_mut(), &id).await?;
        let response = Self::load(tx.as_mut(), post).await?;
        tx.commit().await?;

        cache.posts.invalidate().await;
        tracing::info!("Created post {} ({})", response.post.slug, id);
        Ok(response)
    }

    /// Apply a partial update; tags are replaced when given
    pub async fn update(
        db: &Database,
        cache: &ContentCache,
        id: &str,
        req: UpdatePostRequest,
    ) -> Result<BlogPostResponse> {
        req.validate()?;

        let now = Utc::now();
        let mut tx = db.pool().begin().await?;
        let existing = Self::find_row(tx.as_mut(), id).await?;

        let title = req
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or(existing.title.as_str())
            .to_string();

        let slug = match req.slug.as_deref() {
            Some(explicit) => claim_slug(tx.as_mut(), SlugScope::Posts, explicit, Some(id)).await?,
            None if req.regenerate_slug => {
                unique_slug(tx.as_mut(), SlugScope::Posts, &title, Some(id)).await?
            }
            None => existing.slug.clone(),
        };

        let content = req.content.unwrap_or_else(|| existing.content.clone());
        let reading_time = match req.reading_time {
            Some(minutes) => minutes,
            None if content != existing.content => reading_time::estimate(&content),
            None => existing.reading_time,
        };

        let is_published = req.is_published.unwrap_or(existing.is_published);
        if req.published_at.is_some() && !is_published {
            return Err(AppError::Validation(vec![FieldError::new(
                "published_at",
                "A publish date requires is_published",
            )]));
        }
        let published_at = resolve_published_at(
            existing.published_at.as_deref(),
            existing.is_published,
            is_published,
            req.published_at,
            now,
        );

        let excerpt = match req.excerpt {
            Some(e) if e.trim().is_empty() => Self::derive_excerpt(&content),
            Some(e) => e,
            None => existing.excerpt.clone(),
        };
        let cover_image_url = match req.cover_image_url {
            Some(url) if url.is_empty() => None,
            Some(url) => Some(url),
            None => existing.cover_image_url.clone(),
        };
        let is_featured = req.is_featured.unwrap_or(existing.is_featured);

        sqlx::query(
            r#"
            UPDATE blog_posts SET title = ?, slug = ?, excerpt = ?, content = ?,
                cover_image_url = ?, is_published = ?, published_at = ?, is_featured = ?,
                reading_time = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&slug)
        .bind(&excerpt)
        .bind(&content)
        .bind(&cover_image_url)
        .bind(is_published)
        .bind(&published_at)
        .bind(is_featured)
        .bind(reading_time)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(tx.as_mut())
        .await?;

        if let Some(names) = &req.tags {
            let tags = TagService::resolve(tx.as_mut(), names).await?;
            TagService::set_post_tags(tx.as_mut(), id, &tags).await?;
        }

        let post = Self::find_row(tx.as_mut(), id).await?;
        let response = Self::load(tx.as_mut(), post).await?;
        tx.commit().await?;

        cache.posts.invalidate().await;
        tracing::info!("Updated post {} ({})", response.post.slug, id);
        Ok(response)
    }

    /// Publish or unpublish, optionally with an explicit date
    pub async fn set_published(
        db: &Database,
        cache: &ContentCache,
        id: &str,
        req: PublishRequest,
    ) -> Result<BlogPostResponse> {
        if req.published_at.is_some() && !req.is_published {
            return Err(AppError::Validation(vec![FieldError::new(
                "published_at",
                "A publish date requires is_published",
            )]));
        }

        let now = Utc::now();
        let mut tx = db.pool().begin().await?;
        let existing = Self::find_row(tx.as_mut(), id).await?;

        let published_at = resolve_published_at(
            existing.published_at.as_deref(),
            existing.is_published,
            req.is_published,
            req.published_at,
            now,
        );

        sqlx::query(
            "UPDATE blog_posts SET is_published = ?, published_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(req.is_published)
        .bind(&published_at)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(tx.as_mut())
        .await?;

        let post = Self::find_row(tx.as_mut(), id).await?;
        let response = Self::load(tx.as_mut(), post).await?;
        tx.commit().await?;

        cache.posts.invalidate().await;
        Ok(response)
    }

    /// Delete a post with its media and tag links
    ///
    /// Rows go in one transaction; stored objects are removed afterwards and
    /// a storage failure only leaves an orphaned file behind.
    pub async fn delete(
        db: &Database,
        storage: &dyn StorageProvider,
        cache: &ContentCache,
        id: &str,
    ) -> Result<BlogPost> {
        let mut tx = db.pool().begin().await?;
        let existing = Self::find_row(tx.as_mut(), id).await?;

        let paths = MediaService::delete_rows_for_post(tx.as_mut(), id).await?;
        sqlx::query("DELETE FROM blog_post_tags WHERE post_id = ?")
            .bind(id)
            .execute(tx.as_mut())
            .await?;
        sqlx::query("DELETE FROM blog_posts WHERE id = ?")
            .bind(id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;

        cache.posts.invalidate().await;
        MediaService::delete_objects(storage, &paths).await;

        tracing::info!("Deleted post {} with {} media files", existing.slug, paths.len());
        Ok(existing)
    }
}
