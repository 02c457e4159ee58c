use chrono::{Duration, Utc};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    AppLog, AppLogResponse, LogQuery, NewLogEntry, Paginated, DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
use crate::services::listing;

/// Application event log
pub struct LogService;

impl LogService {
    /// Append an entry. A failed write is reported and swallowed.
    pub async fn record(db: &Database, entry: NewLogEntry) {
        if let Err(e) = Self::insert(db, &entry).await {
            tracing::error!("Failed to write log entry {}: {}", entry.action, e);
        }
    }

    async fn insert(db: &Database, entry: &NewLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_logs (id, log_type, action, details, user_id, user_email,
                ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(entry.log_type.as_str())
        .bind(&entry.action)
        .bind(entry.details.to_string())
        .bind(&entry.user_id)
        .bind(&entry.user_email)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await?;
        Ok(())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &LogQuery) -> Result<()> {
        if let Some(log_type) = query.log_type {
            qb.push(" AND log_type = ").push_bind(log_type.as_str());
        }
        if let Some(action) = query.action.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND LOWER(action) LIKE ")
                .push_bind(listing::like_pattern(action))
                .push(" ESCAPE '\\'");
        }
        if let Some(email) = query
            .user_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            qb.push(" AND LOWER(user_email) = ").push_bind(email.to_lowercase());
        }
        if let Some(from) = listing::bound("from", query.from.as_deref(), false)? {
            qb.push(" AND created_at >= ").push_bind(from.to_rfc3339());
        }
        if let Some(to) = listing::bound("to", query.to.as_deref(), true)? {
            qb.push(" AND created_at <= ").push_bind(to.to_rfc3339());
        }
        Ok(())
    }

    /// Newest first
    pub async fn list(db: &Database, query: &LogQuery) -> Result<Paginated<AppLogResponse>> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM app_logs WHERE 1 = 1");
        Self::push_filters(&mut count, query)?;
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(db.pool()).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM app_logs WHERE 1 = 1");
        Self::push_filters(&mut select, query)?;
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(per_page as i64)
            .push(" OFFSET ")
            .push_bind(listing::sql_offset(page, per_page));
        let rows: Vec<AppLog> = select.build_query_as::<AppLog>().fetch_all(db.pool()).await?;

        let items = rows.into_iter().map(AppLogResponse::from).collect();
        Ok(Paginated::new(items, total as usize, page, per_page))
    }

    /// Delete entries older than `days`, returning how many were removed
    pub async fn prune_older_than(db: &Database, days: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let result = sqlx::query("DELETE FROM app_logs WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(db.pool())
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!("Pruned {} log entries older than {} days", deleted, days);
        }
        Ok(deleted)
    }
}
