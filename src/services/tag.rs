use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Tag, TagWithCount, UpdateTagRequest};
use crate::services::slug::{slugify, unique_slug, SlugScope};
use crate::validation::Validate;

/// Tag row paired with the post it is attached to
#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: String,
    id: String,
    name: String,
    slug: String,
    color: Option<String>,
    created_at: String,
}

impl PostTagRow {
    fn split(self) -> (String, Tag) {
        (
            self.post_id,
            Tag {
                id: self.id,
                name: self.name,
                slug: self.slug,
                color: self.color,
                created_at: self.created_at,
            },
        )
    }
}

pub struct TagService;

impl TagService {
    /// Display form of a tag name: trimmed, inner whitespace collapsed
    fn normalize_name(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Look up each name by slug, inserting missing tags
    ///
    /// Names that map to the same slug collapse into the first one seen,
    /// and the result keeps submission order.
    pub async fn resolve(conn: &mut SqliteConnection, names: &[String]) -> Result<Vec<Tag>> {
        let mut tags: Vec<Tag> = Vec::with_capacity(names.len());

        for raw in names {
            let name = Self::normalize_name(raw);
            let slug = slugify(&name);
            if slug.is_empty() || tags.iter().any(|t| t.slug == slug) {
                continue;
            }

            let existing: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE slug = ?")
                .bind(&slug)
                .fetch_optional(&mut *conn)
                .await?;

            let tag = match existing {
                Some(tag) => tag,
                None => {
                    let tag = Tag {
                        id: Uuid::new_v4().to_string(),
                        name,
                        slug,
                        color: None,
                        created_at: Utc::now().to_rfc3339(),
                    };
                    sqlx::query(
                        "INSERT INTO tags (id, name, slug, color, created_at) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(&tag.id)
                    .bind(&tag.name)
                    .bind(&tag.slug)
                    .bind(&tag.color)
                    .bind(&tag.created_at)
                    .execute(&mut *conn)
                    .await?;
                    tracing::debug!("Created tag {} ({})", tag.name, tag.slug);
                    tag
                }
            };
            tags.push(tag);
        }

        Ok(tags)
    }

    /// Replace a post's tag links, keeping the given order
    pub async fn set_post_tags(
        conn: &mut SqliteConnection,
        post_id: &str,
        tags: &[Tag],
    ) -> Result<()> {
        sqlx::query("DELETE FROM blog_post_tags WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *conn)
            .await?;

        for (position, tag) in tags.iter().enumerate() {
            sqlx::query("INSERT INTO blog_post_tags (post_id, tag_id, position) VALUES (?, ?, ?)")
                .bind(post_id)
                .bind(&tag.id)
                .bind(position as i64)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    pub async fn for_post(conn: &mut SqliteConnection, post_id: &str) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as(
            r#"
            SELECT t.* FROM tags t
            JOIN blog_post_tags bpt ON bpt.tag_id = t.id
            WHERE bpt.post_id = ?
            ORDER BY bpt.position
            "#,
        )
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(tags)
    }

    /// Tags of every post, optionally limited to published posts, keyed by post id
    pub async fn by_post(db: &Database, published_only: bool) -> Result<HashMap<String, Vec<Tag>>> {
        let rows: Vec<PostTagRow> = sqlx::query_as(
            r#"
            SELECT bpt.post_id, t.id, t.name, t.slug, t.color, t.created_at
            FROM blog_post_tags bpt
            JOIN tags t ON t.id = bpt.tag_id
            JOIN blog_posts p ON p.id = bpt.post_id
            WHERE (? = 0 OR p.is_published = 1)
            ORDER BY bpt.post_id, bpt.position
            "#,
        )
        .bind(published_only)
        .fetch_all(db.pool())
        .await?;

        let mut map: HashMap<String, Vec<Tag>> = HashMap::new();
        for row in rows {
            let (post_id, tag) = row.split();
            map.entry(post_id).or_default().push(tag);
        }
        Ok(map)
    }

    /// All tags with their published post counts
    pub async fn list_with_counts(db: &Database) -> Result<Vec<TagWithCount>> {
        let tags = sqlx::query_as(
            r#"
            SELECT t.id, t.name, t.slug, t.color,
                   COUNT(p.id) AS post_count
            FROM tags t
            LEFT JOIN blog_post_tags bpt ON bpt.tag_id = t.id
            LEFT JOIN blog_posts p ON p.id = bpt.post_id AND p.is_published = 1
            GROUP BY t.id
            ORDER BY t.name COLLATE NOCASE
            "#,
        )
        .fetch_all(db.pool())
        .await?;
        Ok(tags)
    }

    pub async fn get(db: &Database, id: &str) -> Result<Tag> {
        sqlx::query_as("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))
    }

    /// Rename or recolor a tag; a new name brings a new slug
    pub async fn update(db: &Database, id: &str, req: UpdateTagRequest) -> Result<Tag> {
        req.validate()?;
        let existing = Self::get(db, id).await?;

        let mut tx = db.pool().begin().await?;

        let (name, slug) = match req.name.as_deref().map(Self::normalize_name) {
            Some(name) if name != existing.name => {
                let slug = unique_slug(tx.as_mut(), SlugScope::Tags, &name, Some(id)).await?;
                (name, slug)
            }
            _ => (existing.name.clone(), existing.slug.clone()),
        };
        let color = match req.color {
            Some(c) if c.is_empty() => None,
            Some(c) => Some(c),
            None => existing.color.clone(),
        };

        sqlx::query("UPDATE tags SET name = ?, slug = ?, color = ? WHERE id = ?")
            .bind(&name)
            .bind(&slug)
            .bind(&color)
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(Tag {
            name,
            slug,
            color,
            ..existing
        })
    }

    /// Delete a tag; its post links go with it
    pub async fn delete(db: &Database, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Tag not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_same_name_any_casing_is_one_tag() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let first = TagService::resolve(&mut conn, &names(&["Rust"])).await.unwrap();
        let second = TagService::resolve(&mut conn, &names(&["rust", " RUST "]))
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].name, "Rust");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_resolve_keeps_order_and_skips_blank() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let tags = TagService::resolve(&mut conn, &names(&["Web  Dev", "!!", "async", "web dev"]))
            .await
            .unwrap();
        let slugs: Vec<_> = tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["web-dev", "async"]);
        assert_eq!(tags[0].name, "Web Dev");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = Database::in_memory().await.unwrap();
        let tag = {
            let mut conn = db.pool().acquire().await.unwrap();
            TagService::resolve(&mut conn, &names(&["Old name"]))
                .await
                .unwrap()
                .remove(0)
        };

        let updated = TagService::update(
            &db,
            &tag.id,
            UpdateTagRequest {
                name: Some("New Name".to_string()),
                color: Some("#ff8800".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.slug, "new-name");
        assert_eq!(updated.color.as_deref(), Some("#ff8800"));

        let listed = TagService::list_with_counts(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].post_count, 0);

        TagService::delete(&db, &tag.id).await.unwrap();
        assert!(matches!(
            TagService::delete(&db, &tag.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
