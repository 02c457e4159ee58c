use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::CurrentUser;

/// Category of an application log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    UserAction,
    Error,
    Success,
    System,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::UserAction => "user_action",
            LogType::Error => "error",
            LogType::Success => "success",
            LogType::System => "system",
        }
    }
}

/// Application log row
#[derive(Debug, Clone, FromRow)]
pub struct AppLog {
    pub id: String,
    pub log_type: String,
    pub action: String,
    pub details: String,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

/// Application log entry as returned by the API, details decoded
#[derive(Debug, Clone, Serialize)]
pub struct AppLogResponse {
    pub id: String,
    pub log_type: String,
    pub action: String,
    pub details: serde_json::Value,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl From<AppLog> for AppLogResponse {
    fn from(log: AppLog) -> Self {
        let details = serde_json::from_str(&log.details)
            .unwrap_or_else(|_| serde_json::Value::String(log.details.clone()));
        Self {
            id: log.id,
            log_type: log.log_type,
            action: log.action,
            details,
            user_id: log.user_id,
            user_email: log.user_email,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            created_at: log.created_at,
        }
    }
}

/// Network context of the request that produced a log entry
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A log entry to append
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub log_type: LogType,
    pub action: String,
    pub details: serde_json::Value,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewLogEntry {
    pub fn new(log_type: LogType, action: &str) -> Self {
        Self {
            log_type,
            action: action.to_string(),
            details: serde_json::json!({}),
            user_id: None,
            user_email: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn user_action(action: &str) -> Self {
        Self::new(LogType::UserAction, action)
    }

    pub fn system(action: &str) -> Self {
        Self::new(LogType::System, action)
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn actor(mut self, user: &CurrentUser) -> Self {
        self.user_id = Some(user.id.clone());
        self.user_email = Some(user.email.clone());
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }
}

/// Admin log list query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub log_type: Option<LogType>,
    pub action: Option<String>,
    pub user_email: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PruneLogsQuery {
    pub older_than_days: u32,
}

#[derive(Debug, Serialize)]
pub struct PruneLogsResponse {
    pub deleted: u64,
}
