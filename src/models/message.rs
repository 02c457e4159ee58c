use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;
use crate::validation::{Validate, Validator};

/// Why the visitor got in touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePurpose {
    General,
    Speaking,
    Workshop,
    Consulting,
    Book,
    Other,
}

impl MessagePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePurpose::General => "general",
            MessagePurpose::Speaking => "speaking",
            MessagePurpose::Workshop => "workshop",
            MessagePurpose::Consulting => "consulting",
            MessagePurpose::Book => "book",
            MessagePurpose::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Some(MessagePurpose::General),
            "speaking" => Some(MessagePurpose::Speaking),
            "workshop" => Some(MessagePurpose::Workshop),
            "consulting" => Some(MessagePurpose::Consulting),
            "book" => Some(MessagePurpose::Book),
            "other" => Some(MessagePurpose::Other),
            _ => None,
        }
    }
}

/// Triage status of a contact message
///
/// `unread -> read -> replied`, and any status back to `unread`.
/// Only an admin moves a message between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Unread,
    Read,
    Replied,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Unread => "unread",
            MessageStatus::Read => "read",
            MessageStatus::Replied => "replied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unread" => Some(MessageStatus::Unread),
            "read" => Some(MessageStatus::Read),
            "replied" => Some(MessageStatus::Replied),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Unread, Read) | (Read, Replied) | (_, Unread)
        ) || *self == next
    }
}

/// Contact message row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContactMessage {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub purpose: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ContactMessage {
    pub fn get_status(&self) -> MessageStatus {
        MessageStatus::parse(&self.status).unwrap_or(MessageStatus::Unread)
    }
}

/// File attached to a contact message
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContactAttachment {
    pub id: String,
    pub message_id: String,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub public_url: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: String,
}

/// Contact message with its attachments
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessageResponse {
    #[serde(flatten)]
    pub message: ContactMessage,
    pub attachments: Vec<ContactAttachment>,
}

/// Public contact form submission
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactSubmission {
    pub full_name: String,
    pub email: String,
    pub purpose: String,
    pub message: String,
}

impl Validate for ContactSubmission {
    fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.required("full_name", &self.full_name, 100);
        v.email("email", &self.email);
        if MessagePurpose::parse(&self.purpose).is_none() {
            v.add("purpose", "Unknown purpose");
        }
        v.length_between("message", &self.message, 10, 5000);
        v.finish()
    }
}

/// Filters shared by the admin list and export
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageFilters {
    pub status: Option<MessageStatus>,
    pub purpose: Option<MessagePurpose>,
    pub search: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Admin message list query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub status: Option<MessageStatus>,
    pub purpose: Option<MessagePurpose>,
    pub search: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl MessageQuery {
    pub fn filters(&self) -> MessageFilters {
        MessageFilters {
            status: self.status,
            purpose: self.purpose,
            search: self.search.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageStatusRequest {
    pub status: MessageStatus,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusRequest {
    pub ids: Vec<String>,
    pub status: MessageStatus,
}

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

/// Export request; explicit `ids` take precedence over `filters`
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    #[serde(default)]
    pub filters: MessageFilters,
    #[serde(default, alias = "includeAttachments")]
    pub include_attachments: bool,
    pub ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use MessageStatus::*;

    #[test]
    fn test_status_transitions() {
        assert!(Unread.can_transition_to(Read));
        assert!(Read.can_transition_to(Replied));
        assert!(Replied.can_transition_to(Unread));
        assert!(Read.can_transition_to(Unread));
        assert!(Read.can_transition_to(Read));

        assert!(!Unread.can_transition_to(Replied));
        assert!(!Replied.can_transition_to(Read));
    }

    #[test]
    fn test_submission_validation() {
        let ok = ContactSubmission {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            purpose: "Workshop".to_string(),
            message: "Could you run a workshop for our team?".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = ContactSubmission {
            purpose: "spam".to_string(),
            message: "hi".to_string(),
            ..ok
        };
        assert!(bad.validate().is_err());
    }
}
