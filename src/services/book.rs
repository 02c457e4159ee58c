use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::cache::{CacheSlot, ContentCache};
use crate::error::Result;
use crate::models::{Book, CreateBookRequest, UpdateBookRequest};
use crate::services::catalog::{merge_optional, CatalogService, PublishFields, RowState};
use crate::services::slug::SlugScope;

/// Book service
pub struct BookService;

#[async_trait]
impl CatalogService for BookService {
    type Item = Book;
    type Create = CreateBookRequest;
    type Update = UpdateBookRequest;

    const SCOPE: SlugScope = SlugScope::Books;

    fn cache_slot(cache: &ContentCache) -> &CacheSlot<Vec<Book>> {
        &cache.books
    }

    fn create_fields(req: &CreateBookRequest) -> PublishFields<'_> {
        PublishFields {
            title: Some(&req.title),
            slug: req.slug.as_deref(),
            is_published: Some(req.is_published),
            published_at: req.published_at,
        }
    }

    fn update_fields(req: &UpdateBookRequest) -> PublishFields<'_> {
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
        req: CreateBookRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, slug, subtitle, description, author, cover_image_url,
                purchase_url, is_published, published_at, is_featured, sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&state.id)
        .bind(req.title.trim())
        .bind(&state.slug)
        .bind(merge_optional(req.subtitle, None))
        .bind(&req.description)
        .bind(req.author.trim())
        .bind(merge_optional(req.cover_image_url, None))
        .bind(merge_optional(req.purchase_url, None))
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
        existing: Book,
        req: UpdateBookRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE books SET title = ?, slug = ?, subtitle = ?, description = ?, author = ?,
                cover_image_url = ?, purchase_url = ?, is_published = ?, published_at = ?,
                is_featured = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title))
        .bind(&state.slug)
        .bind(merge_optional(req.subtitle, existing.subtitle))
        .bind(req.description.unwrap_or(existing.description))
        .bind(req.author.unwrap_or(existing.author))
        .bind(merge_optional(req.cover_image_url, existing.cover_image_url))
        .bind(merge_optional(req.purchase_url, existing.purchase_url))
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
    use crate::error::AppError;
    use crate::models::PublishRequest;
    use std::time::Duration;

    fn request(title: &str) -> CreateBookRequest {
        CreateBookRequest {
            title: title.to_string(),
            slug: None,
            subtitle: Some("A subtitle".to_string()),
            description: "About the book".to_string(),
            author: "A. Author".to_string(),
            cover_image_url: None,
            purchase_url: Some("https://shop.example.com/book".to_string()),
            is_published: false,
            published_at: None,
            is_featured: false,
            sort_order: 0,
        }
    }

    async fn setup() -> (Database, ContentCache) {
        (
            Database::in_memory().await.unwrap(),
            ContentCache::new(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let (db, cache) = setup().await;

        let book = BookService::create(&db, &cache, request("The Book")).await.unwrap();
        assert_eq!(book.slug, "the-book");
        assert!(book.published_at.is_none());

        let twin = BookService::create(&db, &cache, request("The Book")).await.unwrap();
        assert_eq!(twin.slug, "the-book-1");

        let updated = BookService::update(
            &db,
            &cache,
            &book.id,
            UpdateBookRequest {
                subtitle: Some(String::new()),
                is_published: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.subtitle.is_none());
        assert!(updated.is_published);
        assert!(updated.published_at.is_some());
        assert_eq!(updated.title, "The Book");
        assert_eq!(updated.slug, "the-book");

        let renamed = BookService::update(
            &db,
            &cache,
            &twin.id,
            UpdateBookRequest {
                slug: Some("the-book".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(renamed, Err(AppError::Validation(_))));

        BookService::delete(&db, &cache, &book.id).await.unwrap();
        assert!(matches!(
            BookService::get(&db, &book.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_published_cache_follows_writes() {
        let (db, cache) = setup().await;
        let book = BookService::create(&db, &cache, request("Draft book")).await.unwrap();

        assert!(BookService::published(&db, &cache).await.unwrap().is_empty());
        assert!(cache.books.is_warm().await);

        BookService::set_published(
            &db,
            &cache,
            &book.id,
            PublishRequest {
                is_published: true,
                published_at: None,
            },
        )
        .await
        .unwrap();
        assert!(!cache.books.is_warm().await);

        let published = BookService::published(&db, &cache).await.unwrap();
        assert_eq!(published.len(), 1);
        assert!(BookService::get_published_by_slug(&db, "draft-book").await.is_ok());

        BookService::set_published(
            &db,
            &cache,
            &book.id,
            PublishRequest {
                is_published: false,
                published_at: None,
            },
        )
        .await
        .unwrap();
        assert!(BookService::get_published_by_slug(&db, "draft-book").await.is_err());
        assert_eq!(BookService::list_all(&db).await.unwrap().len(), 1);
    }
}
