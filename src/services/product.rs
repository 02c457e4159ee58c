use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::cache::{CacheSlot, ContentCache};
use crate::error::Result;
use crate::models::{CreateProductRequest, Product, UpdateProductRequest};
use crate::services::catalog::{merge_optional, CatalogService, PublishFields, RowState};
use crate::services::slug::SlugScope;

const DEFAULT_CURRENCY: &str = "USD";

/// Product service
pub struct ProductService;

#[async_trait]
impl CatalogService for ProductService {
    type Item = Product;
    type Create = CreateProductRequest;
    type Update = UpdateProductRequest;

    const SCOPE: SlugScope = SlugScope::Products;

    fn cache_slot(cache: &ContentCache) -> &CacheSlot<Vec<Product>> {
        &cache.products
    }

    fn create_fields(req: &CreateProductRequest) -> PublishFields<'_> {
        PublishFields {
            title: Some(&req.title),
            slug: req.slug.as_deref(),
            is_published: Some(req.is_published),
            published_at: req.published_at,
        }
    }

    fn update_fields(req: &UpdateProductRequest) -> PublishFields<'_> {
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
        req: CreateProductRequest,
    ) -> Result<()> {
        let currency = req
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        sqlx::query(
            r#"
            INSERT INTO products (id, title, slug, description, price_cents, currency, image_url,
                purchase_url, is_published, published_at, is_featured, sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&state.id)
        .bind(req.title.trim())
        .bind(&state.slug)
        .bind(&req.description)
        .bind(req.price_cents)
        .bind(currency)
        .bind(merge_optional(req.image_url, None))
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
        existing: Product,
        req: UpdateProductRequest,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products SET title = ?, slug = ?, description = ?, price_cents = ?, currency = ?,
                image_url = ?, purchase_url = ?, is_published = ?, published_at = ?,
                is_featured = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title))
        .bind(&state.slug)
        .bind(req.description.unwrap_or(existing.description))
        .bind(req.price_cents.unwrap_or(existing.price_cents))
        .bind(
            req.currency
                .map(|c| c.to_uppercase())
                .unwrap_or(existing.currency),
        )
        .bind(merge_optional(req.image_url, existing.image_url))
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
    use std::time::Duration;

    #[tokio::test]
    async fn test_currency_defaults_and_normalizes() {
        let db = Database::in_memory().await.unwrap();
        let cache = ContentCache::new(Duration::from_secs(60));

        let product = ProductService::create(
            &db,
            &cache,
            CreateProductRequest {
                title: "Course bundle".to_string(),
                slug: None,
                description: String::new(),
                price_cents: 4900,
                currency: None,
                image_url: None,
                purchase_url: None,
                is_published: false,
                published_at: None,
                is_featured: true,
                sort_order: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(product.currency, "USD");
        assert_eq!(product.price_cents, 4900);

        let updated = ProductService::update(
            &db,
            &cache,
            &product.id,
            UpdateProductRequest {
                currency: Some("eur".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.currency, "EUR");

        let negative = ProductService::update(
            &db,
            &cache,
            &product.id,
            UpdateProductRequest {
                price_cents: Some(-1),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(negative, Err(AppError::Validation(_))));
    }
}
