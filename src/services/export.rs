//! CSV and JSON rendering of contact messages for download.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{ContactAttachment, ContactMessageResponse, ExportFormat};

const CSV_HEADER: [&str; 8] = [
    "ID",
    "Full Name",
    "Email",
    "Purpose",
    "Status",
    "Message",
    "Created At",
    "Attachment Count",
];

/// A rendered export ready to be sent as a download
#[derive(Debug)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    id: &'a str,
    full_name: &'a str,
    email: &'a str,
    purpose: &'a str,
    status: &'a str,
    message: &'a str,
    created_at: &'a str,
    attachment_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<&'a [ContactAttachment]>,
}

/// `messages-<YYYYMMDD-HHMMSS>.<ext>`
pub fn file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "messages-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

pub fn render_csv(messages: &[ContactMessageResponse], include_attachments: bool) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);

    let mut header: Vec<&str> = CSV_HEADER.to_vec();
    if include_attachments {
        header.push("Attachments");
    }
    wtr.write_record(&header)?;

    for item in messages {
        let m = &item.message;
        let count = item.attachments.len().to_string();
        let urls = item
            .attachments
            .iter()
            .map(|a| a.public_url.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let mut record = vec![
            m.id.as_str(),
            m.full_name.as_str(),
            m.email.as_str(),
            m.purpose.as_str(),
            m.status.as_str(),
            m.message.as_str(),
            m.created_at.as_str(),
            count.as_str(),
        ];
        if include_attachments {
            record.push(urls.as_str());
        }
        wtr.write_record(&record)?;
    }

    wtr.into_inner()
        .map_err(|e| AppError::Export(e.to_string()))
}

pub fn render_json(messages: &[ContactMessageResponse], include_attachments: bool) -> Result<Vec<u8>> {
    let records: Vec<ExportRecord<'_>> = messages
        .iter()
        .map(|item| ExportRecord {
            id: &item.message.id,
            full_name: &item.message.full_name,
            email: &item.message.email,
            purpose: &item.message.purpose,
            status: &item.message.status,
            message: &item.message.message,
            created_at: &item.message.created_at,
            attachment_count: item.attachments.len(),
            attachments: include_attachments.then_some(item.attachments.as_slice()),
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&records)?)
}

pub fn render(
    messages: &[ContactMessageResponse],
    format: ExportFormat,
    include_attachments: bool,
    now: DateTime<Utc>,
) -> Result<ExportFile> {
    let body = match format {
        ExportFormat::Csv => render_csv(messages, include_attachments)?,
        ExportFormat::Json => render_json(messages, include_attachments)?,
    };

    tracing::debug!(
        "Rendered {} message(s) as {} ({} bytes)",
        messages.len(),
        format.extension(),
        body.len()
    );

    Ok(ExportFile {
        file_name: file_name(format, now),
        content_type: format.mime_type(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactMessage;
    use chrono::TimeZone;

    fn sample() -> ContactMessageResponse {
        ContactMessageResponse {
            message: ContactMessage {
                id: "m1".to_string(),
                full_name: "Doe, Jane".to_string(),
                email: "jane@example.com".to_string(),
                purpose: "book".to_string(),
                message: "She said \"hello\", then left.\nSecond line".to_string(),
                status: "unread".to_string(),
                created_at: "2026-01-02T03:04:05+00:00".to_string(),
                updated_at: "2026-01-02T03:04:05+00:00".to_string(),
            },
            attachments: vec![
                ContactAttachment {
                    id: "a1".to_string(),
                    message_id: "m1".to_string(),
                    file_name: "one.pdf".to_string(),
                    storage_path: "contact/m1/one.pdf".to_string(),
                    public_url: "/media/contact/m1/one.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                    size: 10,
                    created_at: "2026-01-02T03:04:05+00:00".to_string(),
                },
                ContactAttachment {
                    id: "a2".to_string(),
                    message_id: "m1".to_string(),
                    file_name: "two.png".to_string(),
                    storage_path: "contact/m1/two.png".to_string(),
                    public_url: "/media/contact/m1/two.png".to_string(),
                    mime_type: "image/png".to_string(),
                    size: 20,
                    created_at: "2026-01-02T03:04:05+00:00".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_csv_quoting_reparses() {
        let message = sample();
        let body = render_csv(std::slice::from_ref(&message), true).unwrap();

        let mut reader = csv::Reader::from_reader(body.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 9);
        assert_eq!(&headers[8], "Attachments");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "Doe, Jane");
        assert_eq!(&rows[0][5], message.message.message);
        assert_eq!(&rows[0][7], "2");
        assert_eq!(
            &rows[0][8],
            "/media/contact/m1/one.pdf; /media/contact/m1/two.png"
        );
    }

    #[test]
    fn test_csv_without_attachments_column() {
        let body = render_csv(&[sample()], false).unwrap();
        let text = String::from_utf8(body).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "ID,Full Name,Email,Purpose,Status,Message,Created At,Attachment Count"
        );
    }

    #[test]
    fn test_json_export() {
        let body = render_json(&[sample()], false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value[0]["full_name"], "Doe, Jane");
        assert_eq!(value[0]["attachment_count"], 2);
        assert!(value[0].get("attachments").is_none());

        let body = render_json(&[sample()], true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value[0]["attachments"][1]["file_name"], "two.png");
        assert!(value[0]["attachments"][1].get("storage_path").is_none());
    }

    #[test]
    fn test_file_name() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        let export = render(&[], ExportFormat::Json, false, now).unwrap();
        assert_eq!(export.file_name, "messages-20260309-140507.json");
        assert_eq!(export.content_type, "application/json");
        assert_eq!(String::from_utf8(export.body).unwrap(), "[]");
    }
}
