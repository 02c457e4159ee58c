//! Shared repository logic for the publishable catalog types.
//!
//! Books, engagements and products differ only in their columns; slug
//! handling, the publish rule, caching and lookups live in the provided
//! methods of [`CatalogService`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::cache::{CacheSlot, ContentCache};
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::PublishRequest;
use crate::services::listing::Listable;
use crate::services::publish::resolve_published_at;
use crate::services::slug::{claim_slug, unique_slug, SlugScope};
use crate::validation::{FieldError, Validate};

/// Fields of a write request that drive slug and publish handling
#[derive(Debug, Default)]
pub struct PublishFields<'a> {
    pub title: Option<&'a str>,
    pub slug: Option<&'a str>,
    pub is_published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Values computed for a row before it is written
#[derive(Debug)]
pub struct RowState {
    pub id: String,
    pub slug: String,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub now: String,
}

/// `Some("")` clears an optional column, `None` keeps it
pub fn merge_optional(update: Option<String>, current: Option<String>) -> Option<String> {
    match update {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(value),
        None => current,
    }
}

#[async_trait]
pub trait CatalogService: Send + Sync + 'static {
    type Item: for<'r> FromRow<'r, SqliteRow>
        + Listable
        + Serialize
        + Clone
        + Send
        + Sync
        + Unpin
        + 'static;
    type Create: Validate + DeserializeOwned + Send + 'static;
    type Update: Validate + DeserializeOwned + Send + 'static;

    const SCOPE: SlugScope;

    fn cache_slot(cache: &ContentCache) -> &CacheSlot<Vec<Self::Item>>;

    fn create_fields(req: &Self::Create) -> PublishFields<'_>;

    fn update_fields(req: &Self::Update) -> PublishFields<'_>;

    /// Insert a new row with the resolved slug and publish state
    async fn insert(conn: &mut SqliteConnection, state: &RowState, req: Self::Create) -> Result<()>;

    /// Write an update over `existing`
    async fn apply_update(
        conn: &mut SqliteConnection,
        state: &RowState,
        existing: Self::Item,
        req: Self::Update,
    ) -> Result<()>;

    fn not_found() -> AppError {
        AppError::NotFound(format!("{} not found", Self::SCOPE.label()))
    }

    async fn find(conn: &mut SqliteConnection, id: &str) -> Result<Self::Item> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", Self::SCOPE.table());
        sqlx::query_as::<_, Self::Item>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(Self::not_found)
    }

    async fn get(db: &Database, id: &str) -> Result<Self::Item> {
        let mut conn = db.pool().acquire().await?;
        Self::find(&mut conn, id).await
    }

    async fn get_published_by_slug(db: &Database, slug: &str) -> Result<Self::Item> {
        let sql = format!(
            "SELECT * FROM {} WHERE slug = ? AND is_published = 1",
            Self::SCOPE.table()
        );
        sqlx::query_as::<_, Self::Item>(&sql)
            .bind(slug)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(Self::not_found)
    }

    async fn list_all(db: &Database) -> Result<Vec<Self::Item>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY sort_order, created_at DESC",
            Self::SCOPE.table()
        );
        let items = sqlx::query_as::<_, Self::Item>(&sql)
            .fetch_all(db.pool())
            .await?;
        Ok(items)
    }

    async fn list_published(db: &Database) -> Result<Vec<Self::Item>> {
        let sql = format!(
            "SELECT * FROM {} WHERE is_published = 1 ORDER BY sort_order, created_at DESC",
            Self::SCOPE.table()
        );
        let items = sqlx::query_as::<_, Self::Item>(&sql)
            .fetch_all(db.pool())
            .await?;
        Ok(items)
    }

    /// Published items through the cache
    async fn published(db: &Database, cache: &ContentCache) -> Result<Arc<Vec<Self::Item>>> {
        Self::cache_slot(cache)
            .get_or_refill(|| Self::list_published(db))
            .await
    }

    async fn create(db: &Database, cache: &ContentCache, req: Self::Create) -> Result<Self::Item> {
        req.validate()?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let mut tx = db.pool().begin().await?;

        let state = {
            let fields = Self::create_fields(&req);
            let is_published = fields.is_published.unwrap_or(false);
            let slug = match fields.slug {
                Some(explicit) => claim_slug(tx.as_mut(), Self::SCOPE, explicit, None).await?,
                None => {
                    let title = fields.title.unwrap_or_default();
                    unique_slug(tx.as_mut(), Self::SCOPE, title, None).await?
                }
            };
            RowState {
                id,
                slug,
                is_published,
                published_at: resolve_published_at(
                    None,
                    false,
                    is_published,
                    fields.published_at,
                    now,
                ),
                now: now.to_rfc3339(),
            }
        };

        Self::insert(tx.as_mut(), &state, req).await?;
        let item = Self::find(tx.as_mut(), &state.id).await?;
        tx.commit().await?;

        Self::cache_slot(cache).invalidate().await;
        tracing::info!("Created {} {}", Self::SCOPE.label(), state.slug);
        Ok(item)
    }

    async fn update(
        db: &Database,
        cache: &ContentCache,
        id: &str,
        req: Self::Update,
    ) -> Result<Self::Item> {
        req.validate()?;

        let now = Utc::now();
        let mut tx = db.pool().begin().await?;
        let existing = Self::find(tx.as_mut(), id).await?;

        let state = {
            let fields = Self::update_fields(&req);
            let is_published = fields.is_published.unwrap_or(existing.is_published());
            if fields.published_at.is_some() && !is_published {
                return Err(AppError::Validation(vec![FieldError::new(
                    "published_at",
                    "A publish date requires is_published",
                )]));
            }
            let slug = match fields.slug {
                Some(explicit) => claim_slug(tx.as_mut(), Self::SCOPE, explicit, Some(id)).await?,
                None => current_slug(tx.as_mut(), Self::SCOPE, id).await?,
            };
            RowState {
                id: id.to_string(),
                slug,
                is_published,
                published_at: resolve_published_at(
                    existing.published_at(),
                    existing.is_published(),
                    is_published,
                    fields.published_at,
                    now,
                ),
                now: now.to_rfc3339(),
            }
        };

        Self::apply_update(tx.as_mut(), &state, existing, req).await?;
        let item = Self::find(tx.as_mut(), id).await?;
        tx.commit().await?;

        Self::cache_slot(cache).invalidate().await;
        Ok(item)
    }

    async fn set_published(
        db: &Database,
        cache: &ContentCache,
        id: &str,
        req: PublishRequest,
    ) -> Result<Self::Item> {
        if req.published_at.is_some() && !req.is_published {
            return Err(AppError::Validation(vec![FieldError::new(
                "published_at",
                "A publish date requires is_published",
            )]));
        }

        let now = Utc::now();
        let mut tx = db.pool().begin().await?;
        let existing = Self::find(tx.as_mut(), id).await?;

        let published_at = resolve_published_at(
            existing.published_at(),
            existing.is_published(),
            req.is_published,
            req.published_at,
            now,
        );

        let sql = format!(
            "UPDATE {} SET is_published = ?, published_at = ?, updated_at = ? WHERE id = ?",
            Self::SCOPE.table()
        );
        sqlx::query(&sql)
            .bind(req.is_published)
            .bind(&published_at)
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        let item = Self::find(tx.as_mut(), id).await?;
        tx.commit().await?;

        Self::cache_slot(cache).invalidate().await;
        Ok(item)
    }

    async fn delete(db: &Database, cache: &ContentCache, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", Self::SCOPE.table());
        let result = sqlx::query(&sql).bind(id).execute(db.pool()).await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found());
        }

        Self::cache_slot(cache).invalidate().await;
        tracing::info!("Deleted {} {}", Self::SCOPE.label(), id);
        Ok(())
    }
}

async fn current_slug(conn: &mut SqliteConnection, scope: SlugScope, id: &str) -> Result<String> {
    let sql = format!("SELECT slug FROM {} WHERE id = ?", scope.table());
    let slug = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_optional() {
        assert_eq!(merge_optional(None, Some("a".into())), Some("a".to_string()));
        assert_eq!(merge_optional(Some("".into()), Some("a".into())), None);
        assert_eq!(merge_optional(Some("b".into()), None), Some("b".to_string()));
    }
}
