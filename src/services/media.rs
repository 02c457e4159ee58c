use std::collections::{HashMap, HashSet};
use std::future::Future;

use bytes::Bytes;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::cache::ContentCache;
use crate::config::UploadConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    Media, MediaKind, UpdateMediaRequest, UploadError, UploadOutcome, UploadedFile,
};
use crate::storage::StorageProvider;
use crate::validation::{FieldError, Validate};

pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/avif",
    "image/svg+xml",
];

pub const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/webm", "video/quicktime", "video/ogg"];

/// Contact form attachments: documents plus common images
pub const ATTACHMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/webp",
];

/// Media service: validates, stores and tracks files attached to posts
pub struct MediaService;

impl MediaService {
    /// MIME type of an uploaded file, from the part header or else the file name
    pub fn content_type(file: &UploadedFile) -> String {
        file.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&file.file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            })
    }

    /// Human-readable size, binary units with one decimal
    pub fn format_size(bytes: u64) -> String {
        const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
        if bytes < 1024 {
            return format!("{} B", bytes);
        }
        let mut value = bytes as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        format!("{:.1} {}", value, UNITS[unit])
    }

    fn too_large(size: u64, limit: u64, kind: &str) -> String {
        format!(
            "File too large: {} exceeds the {} limit for {} files",
            Self::format_size(size),
            Self::format_size(limit),
            kind
        )
    }

    /// Check a post media file against the allow-list and its size ceiling
    pub fn check_media(
        mime: &str,
        size: u64,
        limits: &UploadConfig,
    ) -> std::result::Result<MediaKind, String> {
        let (kind, limit) = if IMAGE_MIME_TYPES.contains(&mime) {
            (MediaKind::Image, limits.max_image_bytes)
        } else if VIDEO_MIME_TYPES.contains(&mime) {
            (MediaKind::Video, limits.max_video_bytes)
        } else {
            return Err(format!("Unsupported file type: {}", mime));
        };

        if size == 0 {
            return Err("File is empty".to_string());
        }
        if size > limit {
            return Err(Self::too_large(size, limit, kind.as_str()));
        }
        Ok(kind)
    }

    /// Check a contact form attachment
    pub fn check_attachment(
        mime: &str,
        size: u64,
        limits: &UploadConfig,
    ) -> std::result::Result<(), String> {
        if !ATTACHMENT_MIME_TYPES.contains(&mime) {
            return Err(format!("Unsupported file type: {}", mime));
        }
        if size == 0 {
            return Err("File is empty".to_string());
        }
        if size > limits.max_attachment_bytes {
            return Err(Self::too_large(
                size,
                limits.max_attachment_bytes,
                "attachment",
            ));
        }
        Ok(())
    }

    fn extension(file_name: &str, mime: &str) -> String {
        let from_name = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()));

        from_name
            .or_else(|| {
                mime_guess::get_mime_extensions_str(mime)
                    .and_then(|exts| exts.first())
                    .map(|e| e.to_string())
            })
            .unwrap_or_else(|| "bin".to_string())
    }

    /// `<prefix>/<unix_millis>-<8 random lowercase alphanumerics>.<ext>`
    pub fn storage_path(prefix: &str, file_name: &str, mime: &str) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        format!(
            "{}/{}-{}.{}",
            prefix.trim_end_matches('/'),
            Utc::now().timestamp_millis(),
            suffix,
            Self::extension(file_name, mime)
        )
    }

    /// Store an object, then run `record`; if recording fails the object is removed again
    pub async fn store_with_compensation<T, F, Fut>(
        storage: &dyn StorageProvider,
        path: &str,
        data: Bytes,
        record: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        storage.put(path, data).await?;

        match record().await {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Err(cleanup) = storage.delete(path).await {
                    tracing::warn!("Failed to remove orphaned object {}: {}", path, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Remove stored objects, logging failures instead of returning them
    pub async fn delete_objects(storage: &dyn StorageProvider, paths: &[String]) {
        for path in paths {
            if let Err(e) = storage.delete(path).await {
                tracing::warn!("Failed to delete stored object {}: {}", path, e);
            }
        }
    }

    pub async fn list_for_post(conn: &mut SqliteConnection, post_id: &str) -> Result<Vec<Media>> {
        let media = sqlx::query_as(
            "SELECT * FROM blog_media WHERE post_id = ? ORDER BY sort_order, created_at",
        )
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(media)
    }

    /// Media of every post, optionally limited to published posts, keyed by post id
    pub async fn by_post(db: &Database, published_only: bool) -> Result<HashMap<String, Vec<Media>>> {
        let rows: Vec<Media> = sqlx::query_as(
            r#"
            SELECT m.* FROM blog_media m
            JOIN blog_posts p ON p.id = m.post_id
            WHERE (? = 0 OR p.is_published = 1)
            ORDER BY m.post_id, m.sort_order, m.created_at
            "#,
        )
        .bind(published_only)
        .fetch_all(db.pool())
        .await?;

        let mut map: HashMap<String, Vec<Media>> = HashMap::new();
        for media in rows {
            map.entry(media.post_id.clone()).or_default().push(media);
        }
        Ok(map)
    }

    async fn get(db: &Database, post_id: &str, media_id: &str) -> Result<Media> {
        sqlx::query_as("SELECT * FROM blog_media WHERE id = ? AND post_id = ?")
            .bind(media_id)
            .bind(post_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Media not found".to_string()))
    }

    /// Upload files to a post
    ///
    /// Invalid files are skipped and reported; the request only fails as a
    /// whole when none of the files could be accepted.
    pub async fn upload_many(
        db: &Database,
        storage: &dyn StorageProvider,
        cache: &ContentCache,
        limits: &UploadConfig,
        post_id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<UploadOutcome> {
        if files.is_empty() {
            return Err(AppError::BadRequest("No files provided".to_string()));
        }

        let post_exists: Option<String> = sqlx::query_scalar("SELECT id FROM blog_posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(db.pool())
            .await?;
        if post_exists.is_none() {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let mut next_order: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM blog_media WHERE post_id = ?",
        )
        .bind(post_id)
        .fetch_one(db.pool())
        .await?;

        let prefix = format!("blog/{}", post_id);
        let mut uploaded = Vec::new();
        let mut errors = Vec::new();

        for file in files {
            let mime = Self::content_type(&file);
            let size = file.data.len() as u64;

            let kind = match Self::check_media(&mime, size, limits) {
                Ok(kind) => kind,
                Err(error) => {
                    tracing::warn!("Rejected upload {}: {}", file.file_name, error);
                    errors.push(UploadError {
                        file_name: file.file_name,
                        error,
                    });
                    continue;
                }
            };

            let path = Self::storage_path(&prefix, &file.file_name, &mime);
            let media = Media {
                id: Uuid::new_v4().to_string(),
                post_id: post_id.to_string(),
                public_url: storage.public_url(&path),
                storage_path: path.clone(),
                file_type: kind.as_str().to_string(),
                mime_type: mime,
                file_name: file.file_name,
                size: size as i64,
                alt_text: None,
                caption: None,
                is_featured: false,
                sort_order: next_order,
                created_at: Utc::now().to_rfc3339(),
            };

            let stored = Self::store_with_compensation(storage, &path, file.data, || async {
                sqlx::query(
                    r#"
                    INSERT INTO blog_media (id, post_id, storage_path, public_url, file_type,
                        mime_type, file_name, size, alt_text, caption, is_featured, sort_order, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&media.id)
                .bind(&media.post_id)
                .bind(&media.storage_path)
                .bind(&media.public_url)
                .bind(&media.file_type)
                .bind(&media.mime_type)
                .bind(&media.file_name)
                .bind(media.size)
                .bind(&media.alt_text)
                .bind(&media.caption)
                .bind(media.is_featured)
                .bind(media.sort_order)
                .bind(&media.created_at)
                .execute(db.pool())
                .await?;
                Ok::<_, AppError>(media)
            })
            .await;
            let media = match stored {
                Ok(media) => media,
                Err(e) => {
                    Self::roll_back_batch(db, storage, &uploaded).await;
                    cache.posts.invalidate().await;
                    return Err(e);
                }
            };

            tracing::info!("Uploaded {} to post {}", media.storage_path, post_id);
            next_order += 1;
            uploaded.push(media);
        }

        if uploaded.is_empty() {
            return Err(AppError::Validation(
                errors
                    .iter()
                    .map(|e| FieldError::new("files", &format!("{}: {}", e.file_name, e.error)))
                    .collect(),
            ));
        }

        cache.posts.invalidate().await;
        Ok(UploadOutcome { uploaded, errors })
    }

    /// Undo the files of a batch that were stored before a later file failed
    async fn roll_back_batch(db: &Database, storage: &dyn StorageProvider, uploaded: &[Media]) {
        for media in uploaded {
            if let Err(e) = sqlx::query("DELETE FROM blog_media WHERE id = ?")
                .bind(&media.id)
                .execute(db.pool())
                .await
            {
                tracing::warn!("Failed to roll back media row {}: {}", media.id, e);
            }
        }
        let paths: Vec<String> = uploaded.iter().map(|m| m.storage_path.clone()).collect();
        Self::delete_objects(storage, &paths).await;
        if !uploaded.is_empty() {
            tracing::warn!("Rolled back {} uploaded file(s) after a failed upload", uploaded.len());
        }
    }

    /// Update alt text, caption, order or the featured flag of one media item
    pub async fn update(
        db: &Database,
        cache: &ContentCache,
        post_id: &str,
        media_id: &str,
        req: UpdateMediaRequest,
    ) -> Result<Media> {
        req.validate()?;
        let existing = Self::get(db, post_id, media_id).await?;

        let alt_text = match req.alt_text {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text),
            None => existing.alt_text,
        };
        let caption = match req.caption {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text),
            None => existing.caption,
        };
        let is_featured = req.is_featured.unwrap_or(existing.is_featured);
        let sort_order = req.sort_order.unwrap_or(existing.sort_order);

        let mut tx = db.pool().begin().await?;

        if is_featured {
            sqlx::query("UPDATE blog_media SET is_featured = 0 WHERE post_id = ? AND id <> ?")
                .bind(post_id)
                .bind(media_id)
                .execute(tx.as_mut())
                .await?;
        }

        sqlx::query(
            "UPDATE blog_media SET alt_text = ?, caption = ?, is_featured = ?, sort_order = ? WHERE id = ?",
        )
        .bind(&alt_text)
        .bind(&caption)
        .bind(is_featured)
        .bind(sort_order)
        .bind(media_id)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        cache.posts.invalidate().await;

        Self::get(db, post_id, media_id).await
    }

    /// Assign display order; `media_ids` must list every media item of the post once
    pub async fn reorder(
        db: &Database,
        cache: &ContentCache,
        post_id: &str,
        media_ids: &[String],
    ) -> Result<Vec<Media>> {
        let mut tx = db.pool().begin().await?;

        let current: HashSet<String> = Self::list_for_post(tx.as_mut(), post_id)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        let requested: HashSet<String> = media_ids.iter().cloned().collect();

        if requested.len() != media_ids.len() || requested != current {
            return Err(AppError::Validation(vec![FieldError::new(
                "media_ids",
                "Must list every media item of the post exactly once",
            )]));
        }

        for (position, id) in media_ids.iter().enumerate() {
            sqlx::query("UPDATE blog_media SET sort_order = ? WHERE id = ?")
                .bind(position as i64)
                .bind(id)
                .execute(tx.as_mut())
                .await?;
        }

        let media = Self::list_for_post(tx.as_mut(), post_id).await?;
        tx.commit().await?;
        cache.posts.invalidate().await;
        Ok(media)
    }

    /// Delete one media item; the stored object is removed best-effort
    pub async fn delete(
        db: &Database,
        storage: &dyn StorageProvider,
        cache: &ContentCache,
        post_id: &str,
        media_id: &str,
    ) -> Result<()> {
        let media = Self::get(db, post_id, media_id).await?;

        sqlx::query("DELETE FROM blog_media WHERE id = ?")
            .bind(media_id)
            .execute(db.pool())
            .await?;

        cache.posts.invalidate().await;
        Self::delete_objects(storage, &[media.storage_path]).await;
        Ok(())
    }

    /// Delete every media row of a post, returning the storage paths to clean up
    pub async fn delete_rows_for_post(
        conn: &mut SqliteConnection,
        post_id: &str,
    ) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT storage_path FROM blog_media WHERE post_id = ?")
            .bind(post_id)
            .fetch_all(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM blog_media WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *conn)
            .await?;

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use std::time::Duration;

    fn limits() -> UploadConfig {
        UploadConfig {
            max_image_bytes: 5 * 1024 * 1024,
            max_video_bytes: 25 * 1024 * 1024,
            max_attachment_bytes: 10 * 1024 * 1024,
        }
    }

    fn file(name: &str, content_type: &str, data: &'static [u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: Some(content_type.to_string()),
            data: Bytes::from_static(data),
        }
    }

    async fn setup() -> (Database, tempfile::TempDir, LocalStorage, ContentCache) {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("INSERT INTO blog_posts (id, title, slug) VALUES ('post-1', 'Post', 'post')")
            .execute(db.pool())
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media");
        (db, dir, storage, ContentCache::new(Duration::from_secs(60)))
    }

    #[test]
    fn test_format_size() {
        assert_eq!(MediaService::format_size(512), "512 B");
        assert_eq!(MediaService::format_size(1536), "1.5 KB");
        assert_eq!(MediaService::format_size(25 * 1024 * 1024), "25.0 MB");
    }

    #[test]
    fn test_oversized_video_reports_size_and_limit() {
        let err = MediaService::check_media("video/mp4", 30 * 1024 * 1024, &limits()).unwrap_err();
        assert_eq!(
            err,
            "File too large: 30.0 MB exceeds the 25.0 MB limit for video files"
        );
        assert!(MediaService::check_media("video/mp4", 1024, &limits()).is_ok());
        assert!(MediaService::check_media("application/zip", 10, &limits()).is_err());
    }

    #[test]
    fn test_attachment_rules() {
        assert!(MediaService::check_attachment("application/pdf", 2048, &limits()).is_ok());
        assert!(MediaService::check_attachment("video/mp4", 2048, &limits()).is_err());
        let err = MediaService::check_attachment("application/pdf", 11 * 1024 * 1024, &limits())
            .unwrap_err();
        assert!(err.contains("limit for attachment files"));
    }

    #[test]
    fn test_storage_path_shape() {
        let path = MediaService::storage_path("blog/post-1", "Holiday Photo.JPG", "image/jpeg");
        let rest = path.strip_prefix("blog/post-1/").unwrap();
        let (stem, ext) = rest.rsplit_once('.').unwrap();
        let (millis, random) = stem.split_once('-').unwrap();
        assert_eq!(ext, "jpg");
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(random.len(), 8);
        assert!(random
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        let path = MediaService::storage_path("blog/post-1", "clip", "video/mp4");
        assert!(path.ends_with(".mp4"), "{}", path);
    }

    #[test]
    fn test_content_type_falls_back_to_name() {
        let f = UploadedFile {
            file_name: "diagram.png".to_string(),
            content_type: Some("application/octet-stream".to_string()),
            data: Bytes::new(),
        };
        assert_eq!(MediaService::content_type(&f), "image/png");
    }

    #[tokio::test]
    async fn test_upload_skips_invalid_files() {
        let (db, dir, storage, cache) = setup().await;

        let outcome = MediaService::upload_many(
            &db,
            &storage,
            &cache,
            &limits(),
            "post-1",
            vec![
                file("a.png", "image/png", b"png-bytes"),
                file("notes.exe", "application/x-msdownload", b"MZ"),
                file("b.webp", "image/webp", b"webp-bytes"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(outcome.uploaded.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].file_name, "notes.exe");
        assert_eq!(outcome.uploaded[0].sort_order, 0);
        assert_eq!(outcome.uploaded[1].sort_order, 1);

        let stored = dir.path().join(&outcome.uploaded[0].storage_path);
        assert!(stored.exists());
        assert!(outcome.uploaded[0].public_url.starts_with("/media/blog/post-1/"));
    }

    #[tokio::test]
    async fn test_upload_with_only_rejected_files_fails() {
        let (db, _dir, storage, cache) = setup().await;
        let err = MediaService::upload_many(
            &db,
            &storage,
            &cache,
            &limits(),
            "post-1",
            vec![file("x.zip", "application/zip", b"PK")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = MediaService::upload_many(
            &db,
            &storage,
            &cache,
            &limits(),
            "missing",
            vec![file("a.png", "image/png", b"png")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_record_removes_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media");

        let result: Result<()> = MediaService::store_with_compensation(
            &storage,
            "blog/p/1-abcdefgh.png",
            Bytes::from_static(b"png"),
            || async { Err(AppError::Internal("insert failed".to_string())) },
        )
        .await;

        assert!(result.is_err());
        assert!(!storage.exists("blog/p/1-abcdefgh.png").await.unwrap());
    }

    /// Local storage that refuses every `put` after the first `allowed` ones
    struct FlakyStorage {
        inner: LocalStorage,
        allowed: usize,
        puts: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl StorageProvider for FlakyStorage {
        async fn put(&self, path: &str, data: Bytes) -> Result<()> {
            let n = self.puts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n >= self.allowed {
                return Err(AppError::Storage("disk full".to_string()));
            }
            self.inner.put(path, data).await
        }

        async fn get(&self, path: &str) -> Result<Bytes> {
            self.inner.get(path).await
        }

        async fn delete(&self, path: &str) -> Result<()> {
            self.inner.delete(path).await
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            self.inner.exists(path).await
        }

        fn public_url(&self, path: &str) -> String {
            self.inner.public_url(path)
        }

        fn storage_type(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back_and_invalidates() {
        let (db, dir, _local, cache) = setup().await;
        let storage = FlakyStorage {
            inner: LocalStorage::new(dir.path(), "/media"),
            allowed: 1,
            puts: std::sync::atomic::AtomicUsize::new(0),
        };
        cache.posts.get_or_refill(|| async { Ok(Vec::new()) }).await.unwrap();
        assert!(cache.posts.is_warm().await);

        let err = MediaService::upload_many(
            &db,
            &storage,
            &cache,
            &limits(),
            "post-1",
            vec![
                file("a.png", "image/png", b"a"),
                file("b.png", "image/png", b"b"),
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blog_media WHERE post_id = 'post-1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert!(!dir.path().join("blog").join("post-1").exists()
            || std::fs::read_dir(dir.path().join("blog").join("post-1"))
                .unwrap()
                .next()
                .is_none());
        assert!(!cache.posts.is_warm().await);
    }

    #[tokio::test]
    async fn test_update_reorder_delete() {
        let (db, dir, storage, cache) = setup().await;
        let outcome = MediaService::upload_many(
            &db,
            &storage,
            &cache,
            &limits(),
            "post-1",
            vec![
                file("a.png", "image/png", b"a"),
                file("b.png", "image/png", b"b"),
            ],
        )
        .await
        .unwrap();
        let a = outcome.uploaded[0].id.clone();
        let b = outcome.uploaded[1].id.clone();

        MediaService::update(
            &db,
            &cache,
            "post-1",
            &a,
            UpdateMediaRequest {
                alt_text: Some("First".to_string()),
                caption: None,
                is_featured: Some(true),
                sort_order: None,
            },
        )
        .await
        .unwrap();
        let updated = MediaService::update(
            &db,
            &cache,
            "post-1",
            &b,
            UpdateMediaRequest {
                alt_text: None,
                caption: None,
                is_featured: Some(true),
                sort_order: None,
            },
        )
        .await
        .unwrap();
        assert!(updated.is_featured);

        let reordered = MediaService::reorder(&db, &cache, "post-1", &[b.clone(), a.clone()])
            .await
            .unwrap();
        assert_eq!(reordered[0].id, b);
        assert_eq!(reordered[1].id, a);
        assert!(!reordered[1].is_featured);
        assert_eq!(reordered[1].alt_text.as_deref(), Some("First"));

        assert!(MediaService::reorder(&db, &cache, "post-1", &[a.clone()])
            .await
            .is_err());

        let path = dir.path().join(&reordered[0].storage_path);
        MediaService::delete(&db, &storage, &cache, "post-1", &b)
            .await
            .unwrap();
        assert!(!path.exists());
        assert!(matches!(
            MediaService::delete(&db, &storage, &cache, "post-1", &b).await,
            Err(AppError::NotFound(_))
        ));
    }
}
