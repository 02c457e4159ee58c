use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    BatchResult, ContactAttachment, ContactMessage, ContactMessageResponse, ContactSubmission,
    MessageFilters, MessagePurpose, MessageQuery, MessageStatus, Paginated, UploadedFile,
    DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
use crate::services::listing;
use crate::services::MediaService;
use crate::storage::StorageProvider;
use crate::validation::{FieldError, Validate};

pub const MAX_ATTACHMENTS: usize = 5;

/// Contact message service
pub struct MessageService;

impl MessageService {
    /// Store a public contact form submission and its attachments
    ///
    /// Every attachment is checked before anything is written. Objects stored
    /// before a failed commit are removed again.
    pub async fn submit(
        db: &Database,
        storage: &dyn StorageProvider,
        limits: &UploadConfig,
        submission: ContactSubmission,
        attachments: Vec<UploadedFile>,
    ) -> Result<ContactMessageResponse> {
        submission.validate()?;

        if attachments.len() > MAX_ATTACHMENTS {
            return Err(AppError::Validation(vec![FieldError::new(
                "attachments",
                &format!("At most {} attachments are allowed", MAX_ATTACHMENTS),
            )]));
        }

        let mut errors = Vec::new();
        let mut checked = Vec::with_capacity(attachments.len());
        for file in attachments {
            let mime = MediaService::content_type(&file);
            match MediaService::check_attachment(&mime, file.data.len() as u64, limits) {
                Ok(()) => checked.push((file, mime)),
                Err(e) => errors.push(FieldError::new(
                    "attachments",
                    &format!("{}: {}", file.file_name, e),
                )),
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let now = Utc::now().to_rfc3339();
        let message = ContactMessage {
            id: Uuid::new_v4().to_string(),
            full_name: submission.full_name.trim().to_string(),
            email: submission.email.trim().to_lowercase(),
            purpose: MessagePurpose::parse(&submission.purpose)
                .unwrap_or(MessagePurpose::General)
                .as_str()
                .to_string(),
            message: submission.message.trim().to_string(),
            status: MessageStatus::Unread.as_str().to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut stored = Vec::new();
        match Self::write_submission(db, storage, &message, checked, &mut stored).await {
            Ok(attachments) => {
                tracing::info!(
                    "Contact message {} received with {} attachment(s)",
                    message.id,
                    attachments.len()
                );
                Ok(ContactMessageResponse {
                    message,
                    attachments,
                })
            }
            Err(e) => {
                MediaService::delete_objects(storage, &stored).await;
                Err(e)
            }
        }
    }

    async fn write_submission(
        db: &Database,
        storage: &dyn StorageProvider,
        message: &ContactMessage,
        files: Vec<(UploadedFile, String)>,
        stored: &mut Vec<String>,
    ) -> Result<Vec<ContactAttachment>> {
        let mut tx = db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contact_messages (id, full_name, email, purpose, message, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.full_name)
        .bind(&message.email)
        .bind(&message.purpose)
        .bind(&message.message)
        .bind(&message.status)
        .bind(&message.created_at)
        .bind(&message.updated_at)
        .execute(tx.as_mut())
        .await?;

        let prefix = format!("contact/{}", message.id);
        let mut attachments = Vec::with_capacity(files.len());

        for (file, mime) in files {
            let path = MediaService::storage_path(&prefix, &file.file_name, &mime);
            let size = file.data.len() as i64;
            storage.put(&path, file.data).await?;
            stored.push(path.clone());

            let attachment = ContactAttachment {
                id: Uuid::new_v4().to_string(),
                message_id: message.id.clone(),
                file_name: file.file_name,
                public_url: storage.public_url(&path),
                storage_path: path,
                mime_type: mime,
                size,
                created_at: message.created_at.clone(),
            };

            sqlx::query(
                r#"
                INSERT INTO contact_attachments (id, message_id, file_name, storage_path, public_url,
                    mime_type, size, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&attachment.id)
            .bind(&attachment.message_id)
            .bind(&attachment.file_name)
            .bind(&attachment.storage_path)
            .bind(&attachment.public_url)
            .bind(&attachment.mime_type)
            .bind(attachment.size)
            .bind(&attachment.created_at)
            .execute(tx.as_mut())
            .await?;

            attachments.push(attachment);
        }

        tx.commit().await?;
        Ok(attachments)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filters: &MessageFilters) -> Result<()> {
        if let Some(status) = filters.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(purpose) = filters.purpose {
            qb.push(" AND purpose = ").push_bind(purpose.as_str());
        }
        if let Some(search) = filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = listing::like_pattern(search);
            qb.push(" AND (LOWER(full_name) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(email) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(message) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(from) = listing::bound("from", filters.from.as_deref(), false)? {
            qb.push(" AND created_at >= ").push_bind(from.to_rfc3339());
        }
        if let Some(to) = listing::bound("to", filters.to.as_deref(), true)? {
            qb.push(" AND created_at <= ").push_bind(to.to_rfc3339());
        }
        Ok(())
    }

    async fn attachments_for(
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<ContactAttachment>>> {
        let mut grouped: HashMap<String, Vec<ContactAttachment>> = HashMap::new();
        if ids.is_empty() {
            return Ok(grouped);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM contact_attachments WHERE message_id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY created_at, file_name");

        let rows: Vec<ContactAttachment> = qb.build_query_as().fetch_all(&mut *conn).await?;
        for row in rows {
            grouped.entry(row.message_id.clone()).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn with_attachments(
        conn: &mut SqliteConnection,
        messages: Vec<ContactMessage>,
    ) -> Result<Vec<ContactMessageResponse>> {
        let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        let mut attachments = Self::attachments_for(conn, &ids).await?;

        Ok(messages
            .into_iter()
            .map(|message| ContactMessageResponse {
                attachments: attachments.remove(&message.id).unwrap_or_default(),
                message,
            })
            .collect())
    }

    /// Admin list, newest first; status is left untouched
    pub async fn list(
        db: &Database,
        query: &MessageQuery,
    ) -> Result<Paginated<ContactMessageResponse>> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let filters = query.filters();

        let mut conn = db.pool().acquire().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM contact_messages WHERE 1 = 1");
        Self::push_filters(&mut count, &filters)?;
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM contact_messages WHERE 1 = 1");
        Self::push_filters(&mut select, &filters)?;
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(listing::sql_offset(page, per_page));
        let messages: Vec<ContactMessage> = select.build_query_as().fetch_all(&mut *conn).await?;

        let items = Self::with_attachments(&mut conn, messages).await?;
        Ok(Paginated::new(items, total as usize, page, per_page))
    }

    async fn find(conn: &mut SqliteConnection, id: &str) -> Result<ContactMessage> {
        sqlx::query_as("SELECT * FROM contact_messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))
    }

    /// Message detail; an unread message becomes read
    pub async fn open(db: &Database, id: &str) -> Result<ContactMessageResponse> {
        let mut conn = db.pool().acquire().await?;
        let mut message = Self::find(&mut conn, id).await?;

        if message.get_status() == MessageStatus::Unread {
            let now = Utc::now().to_rfc3339();
            sqlx::query("UPDATE contact_messages SET status = ?, updated_at = ? WHERE id = ?")
                .bind(MessageStatus::Read.as_str())
                .bind(&now)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            message.status = MessageStatus::Read.as_str().to_string();
            message.updated_at = now;
        }

        let attachments = Self::attachments_for(&mut conn, &[message.id.clone()])
            .await?
            .remove(&message.id)
            .unwrap_or_default();
        Ok(ContactMessageResponse {
            message,
            attachments,
        })
    }

    pub async fn set_status(
        db: &Database,
        id: &str,
        status: MessageStatus,
    ) -> Result<ContactMessage> {
        let mut conn = db.pool().acquire().await?;
        let mut message = Self::find(&mut conn, id).await?;
        let current = message.get_status();

        if current == status {
            return Ok(message);
        }
        if !current.can_transition_to(status) {
            return Err(AppError::Validation(vec![FieldError::new(
                "status",
                &format!(
                    "Cannot change status from {} to {}",
                    current.as_str(),
                    status.as_str()
                ),
            )]));
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE contact_messages SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        message.status = status.as_str().to_string();
        message.updated_at = now;
        Ok(message)
    }

    fn distinct_ids(ids: &[String]) -> Result<Vec<String>> {
        let mut seen = Vec::with_capacity(ids.len());
        for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            if !seen.iter().any(|s: &String| s == id) {
                seen.push(id.to_string());
            }
        }
        if seen.is_empty() {
            return Err(AppError::BadRequest("No message ids provided".to_string()));
        }
        Ok(seen)
    }

    /// Apply a status change to each id; failures are counted, not raised
    pub async fn batch_status(
        db: &Database,
        ids: &[String],
        status: MessageStatus,
    ) -> Result<BatchResult> {
        let ids = Self::distinct_ids(ids)?;
        let mut result = BatchResult {
            total: ids.len(),
            ..Default::default()
        };

        for id in &ids {
            match Self::set_status(db, id, status).await {
                Ok(_) => result.succeeded += 1,
                Err(e) => {
                    tracing::debug!("Batch status change skipped {}: {}", id, e);
                    result.failed += 1;
                }
            }
        }
        Ok(result)
    }

    /// Delete a message; its stored attachments are removed after the commit
    pub async fn delete(db: &Database, storage: &dyn StorageProvider, id: &str) -> Result<()> {
        let mut tx = db.pool().begin().await?;
        Self::find(tx.as_mut(), id).await?;

        let paths: Vec<String> =
            sqlx::query_scalar("SELECT storage_path FROM contact_attachments WHERE message_id = ?")
                .bind(id)
                .fetch_all(tx.as_mut())
                .await?;

        sqlx::query("DELETE FROM contact_attachments WHERE message_id = ?")
            .bind(id)
            .execute(tx.as_mut())
            .await?;
        sqlx::query("DELETE FROM contact_messages WHERE id = ?")
            .bind(id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;

        MediaService::delete_objects(storage, &paths).await;
        tracing::info!("Deleted contact message {}", id);
        Ok(())
    }

    pub async fn batch_delete(
        db: &Database,
        storage: &dyn StorageProvider,
        ids: &[String],
    ) -> Result<BatchResult> {
        let ids = Self::distinct_ids(ids)?;
        let mut result = BatchResult {
            total: ids.len(),
            ..Default::default()
        };

        for id in &ids {
            match Self::delete(db, storage, id).await {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    tracing::debug!("Batch delete skipped {}: {}", id, e);
                    result.failed += 1;
                }
            }
        }
        Ok(result)
    }

    /// Messages selected for export: explicit ids when given, otherwise every filter match
    pub async fn for_export(
        db: &Database,
        ids: Option<&[String]>,
        filters: &MessageFilters,
    ) -> Result<Vec<ContactMessageResponse>> {
        let mut conn = db.pool().acquire().await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM contact_messages WHERE 1 = 1");
        match ids.filter(|ids| !ids.is_empty()) {
            Some(ids) => {
                qb.push(" AND id IN (");
                let mut separated = qb.separated(", ");
                for id in ids {
                    separated.push_bind(id.clone());
                }
                separated.push_unseparated(")");
            }
            None => Self::push_filters(&mut qb, filters)?,
        }
        qb.push(" ORDER BY created_at DESC, id");

        let messages: Vec<ContactMessage> = qb.build_query_as().fetch_all(&mut *conn).await?;
        Self::with_attachments(&mut conn, messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use bytes::Bytes;

    fn submission(name: &str) -> ContactSubmission {
        ContactSubmission {
            full_name: name.to_string(),
            email: "Visitor@Example.com".to_string(),
            purpose: "speaking".to_string(),
            message: "Would you speak at our conference next spring?".to_string(),
        }
    }

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: Some("application/pdf".to_string()),
            data: Bytes::from_static(b"%PDF-1.4 test"),
        }
    }

    async fn setup() -> (Database, LocalStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media");
        (Database::in_memory().await.unwrap(), storage, dir)
    }

    #[tokio::test]
    async fn test_submit_with_attachment() {
        let (db, storage, dir) = setup().await;
        let limits = UploadConfig::default();

        let created = MessageService::submit(&db, &storage, &limits, submission("Grace"), vec![pdf("brief.pdf")])
            .await
            .unwrap();
        assert_eq!(created.message.status, "unread");
        assert_eq!(created.message.email, "visitor@example.com");
        assert_eq!(created.attachments.len(), 1);

        let stored = dir.path().join(&created.attachments[0].storage_path);
        assert!(stored.exists());
        assert!(created.attachments[0].public_url.starts_with("/media/contact/"));
    }

    #[tokio::test]
    async fn test_rejected_attachment_writes_nothing() {
        let (db, storage, _dir) = setup().await;
        let limits = UploadConfig::default();
        let exe = UploadedFile {
            file_name: "setup.exe".to_string(),
            content_type: Some("application/x-msdownload".to_string()),
            data: Bytes::from_static(b"MZ"),
        };

        let result = MessageService::submit(&db, &storage, &limits, submission("Mallory"), vec![exe]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let page = MessageService::list(&db, &MessageQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_listing_does_not_mark_read_but_opening_does() {
        let (db, storage, _dir) = setup().await;
        let limits = UploadConfig::default();
        let created = MessageService::submit(&db, &storage, &limits, submission("Ada"), vec![])
            .await
            .unwrap();

        let page = MessageService::list(&db, &MessageQuery::default()).await.unwrap();
        assert_eq!(page.items[0].message.status, "unread");
        let page = MessageService::list(&db, &MessageQuery::default()).await.unwrap();
        assert_eq!(page.items[0].message.status, "unread");

        let opened = MessageService::open(&db, &created.message.id).await.unwrap();
        assert_eq!(opened.message.status, "read");

        let unread = MessageQuery {
            status: Some(MessageStatus::Unread),
            ..Default::default()
        };
        assert_eq!(MessageService::list(&db, &unread).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (db, storage, _dir) = setup().await;
        let limits = UploadConfig::default();
        let mut full = submission("Fee question");
        full.message = "Can you cover 100% of the travel costs?".to_string();
        MessageService::submit(&db, &storage, &limits, full, vec![]).await.unwrap();
        let mut partial = submission("Other question");
        partial.message = "Can you cover 1000 dollars of the costs?".to_string();
        MessageService::submit(&db, &storage, &limits, partial, vec![]).await.unwrap();

        let query = MessageQuery {
            search: Some("100%".to_string()),
            ..Default::default()
        };
        let page = MessageService::list(&db, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].message.full_name, "Fee question");

        let query = MessageQuery {
            search: Some("_".to_string()),
            ..Default::default()
        };
        assert_eq!(MessageService::list(&db, &query).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let (db, storage, _dir) = setup().await;
        let limits = UploadConfig::default();
        MessageService::submit(&db, &storage, &limits, submission("Ada"), vec![]).await.unwrap();

        let query = MessageQuery {
            page: Some(u32::MAX),
            per_page: Some(100),
            ..Default::default()
        };
        let page = MessageService::list(&db, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items.is_empty());
        assert_eq!(page.page, u32::MAX);
    }

    #[tokio::test]
    async fn test_status_machine_and_batches() {
        let (db, storage, _dir) = setup().await;
        let limits = UploadConfig::default();
        let a = MessageService::submit(&db, &storage, &limits, submission("A"), vec![]).await.unwrap();
        let b = MessageService::submit(&db, &storage, &limits, submission("B"), vec![]).await.unwrap();

        let skip = MessageService::set_status(&db, &a.message.id, MessageStatus::Replied).await;
        assert!(matches!(skip, Err(AppError::Validation(_))));

        let ids = vec![a.message.id.clone(), b.message.id.clone(), "missing".to_string()];
        let result = MessageService::batch_status(&db, &ids, MessageStatus::Read).await.unwrap();
        assert_eq!(
            result,
            BatchResult {
                total: 3,
                succeeded: 2,
                failed: 1
            }
        );

        let replied = MessageService::set_status(&db, &a.message.id, MessageStatus::Replied)
            .await
            .unwrap();
        assert_eq!(replied.status, "replied");

        let result = MessageService::batch_delete(&db, &storage, &ids).await.unwrap();
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);

        let empty = MessageService::batch_delete(&db, &storage, &[]).await;
        assert!(matches!(empty, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_filters_and_export_selection() {
        let (db, storage, _dir) = setup().await;
        let limits = UploadConfig::default();
        let mut general = submission("Linus");
        general.purpose = "general".to_string();
        let kept = MessageService::submit(&db, &storage, &limits, general, vec![]).await.unwrap();
        MessageService::submit(&db, &storage, &limits, submission("Barbara"), vec![pdf("cv.pdf")])
            .await
            .unwrap();

        let query = MessageQuery {
            purpose: Some(MessagePurpose::Speaking),
            ..Default::default()
        };
        let page = MessageService::list(&db, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].attachments.len(), 1);

        let query = MessageQuery {
            search: Some("LINUS".to_string()),
            ..Default::default()
        };
        assert_eq!(MessageService::list(&db, &query).await.unwrap().total, 1);

        let bad_date = MessageQuery {
            from: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(MessageService::list(&db, &bad_date).await.is_err());

        let ids = vec![kept.message.id.clone()];
        let selected = MessageService::for_export(&db, Some(&ids), &MessageFilters::default())
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].message.full_name, "Linus");

        let all = MessageService::for_export(&db, None, &MessageFilters::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
