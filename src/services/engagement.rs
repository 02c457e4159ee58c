use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::cache::{CacheSlot, ContentCache};
use crate::error::Result;
use crate::models::{CreateEngagementRequest, Engagement, UpdateEngagementRequest};
use crate::services::catalog::{merge_optional, CatalogService, PublishFields, RowState};
use crate::services::slug::SlugScope;

/// Engagement service
pub struct EngagementService;

#[async_trait]
impl CatalogService for EngagementService {
    type Item = Engagement;
    type Create = CreateEngagementRequest;
    type Update = UpdateEngagementRequest;

    const SCOPE: SlugScope = SlugScope::Engagements;

    fn cache_slot(cache: &ContentCache) -> &CacheSlot<Vec<Engagement>> {
        &cache.engagements
    }

    fn create_fields(req: &CreateEngagementRequest) -> PublishFields<'_> {
        PublishFields {
            title: Some(&req.title),
            slug: req.slug.as_deref(),
            is_published: Some(req.is_published),
            published_at: req.published_at,
        }
    }

    fn update_fields(req: &UpdateEngagementRequest) -> PublishFields<'_> {
        PublishFields {
            title: req.title.as_deref(),
            slug: req.slug.as_deref(),
            is_published: req.is_published,
            published_at: req.published_at,
        }
    }

    async fn insert(
        conn: &mut SqliteConnection,
        state: &RowState,
        req: CreateEngagementRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO engagements (id, title, slug, summary, description, format, duration,
                location, image_url, booking_url, is_published, published_at, is_featured,
                sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&state.id)
        .bind(req.title.trim())
        .bind(&state.slug)
        .bind(&req.summary)
        .bind(&req.description)
        .bind(req.format.as_str())
        .bind(merge_optional(req.duration, None))
        .bind(merge_optional(req.location, None))
        .bind(merge_optional(req.image_url, None))
        .bind(merge_optional(req.booking_url, None))
        .bind(state.is_published)
        .bind(&state.published_at)
        .bind(req.is_featured)
        .bind(req.sort_order)
        .bind(&state.now)
        .bind(&state.now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn apply_update(
        conn: &mut SqliteConnection,
        state: &RowState,
        existing: Engagement,
        req: UpdateEngagementRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE engagements SET title = ?, slug = ?, summary = ?, description = ?, format = ?,
                duration = ?, location = ?, image_url = ?, booking_url = ?, is_published = ?,
                published_at = ?, is_featured = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title))
        .bind(&state.slug)
        .bind(req.summary.unwrap_or(existing.summary))
        .bind(req.description.unwrap_or(existing.description))
        .bind(
            req.format
                .map(|f| f.as_str().to_string())
                .unwrap_or(existing.format),
        )
        .bind(merge_optional(req.duration, existing.duration))
        .bind(merge_optional(req.location, existing.location))
        .bind(merge_optional(req.image_url, existing.image_url))
        .bind(merge_optional(req.booking_url, existing.booking_url))
        .bind(state.is_published)
        .bind(&state.published_at)
        .bind(req.is_featured.unwrap_or(existing.is_featured))
        .bind(req.sort_order.unwrap_or(existing.sort_order))
        .bind(&state.now)
        .bind(&state.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EngagementFormat, ListQuery};
    use crate::services::listing;
    use std::time::Duration;

    fn request(title: &str, sort_order: i64) -> CreateEngagementRequest {
        CreateEngagementRequest {
            title: title.to_string(),
            slug: None,
            summary: "Summary".to_string(),
            description: String::new(),
            format: EngagementFormat::Workshop,
            duration: Some("2 days".to_string()),
            location: None,
            image_url: None,
            booking_url: None,
            is_published: true,
            published_at: None,
            is_featured: false,
            sort_order,
        }
    }

    #[tokio::test]
    async fn test_published_list_uses_sort_order() {
        let db = Database::in_memory().await.unwrap();
        let cache = ContentCache::new(Duration::from_secs(60));

        EngagementService::create(&db, &cache, request("Second", 2)).await.unwrap();
        let first = EngagementService::create(&db, &cache, request("First", 1))
            .await
            .unwrap();

        let items = EngagementService::published(&db, &cache).await.unwrap();
        let page = listing::apply(&items, &ListQuery::default()).unwrap();
        let titles: Vec<_> = page.items.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);

        let updated = EngagementService::update(
            &db,
            &cache,
            &first.id,
            UpdateEngagementRequest {
                format: Some(EngagementFormat::Keynote),
                duration: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.format, "keynote");
        assert!(updated.duration.is_none());
    }
}
