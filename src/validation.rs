//! Field-level validation for incoming content.
//!
//! Request models implement [`Validate`] by pushing every problem they find into a
//! [`Validator`], so a client gets all field errors in one response instead of the
//! first one only. Nothing is written when validation fails.

use serde::Serialize;

use crate::error::{AppError, Result};

/// A single field-level problem, serialized into the 400 response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Collects field errors and turns them into an [`AppError::Validation`].
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Non-empty after trimming, at most `max` characters.
    pub fn required(&mut self, field: &str, value: &str, max: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, format!("{} is required", label(field)));
        } else if trimmed.chars().count() > max {
            self.add(
                field,
                format!("{} must be at most {} characters", label(field), max),
            );
        }
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.add(
                    field,
                    format!("{} must be at most {} characters", label(field), max),
                );
            }
        }
    }

    pub fn length_between(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.add(
                field,
                format!(
                    "{} must be between {} and {} characters",
                    label(field),
                    min,
                    max
                ),
            );
        }
    }

    /// An explicitly supplied slug must already be in canonical form.
    pub fn slug(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value {
            if !is_valid_slug(v) {
                self.add(
                    field,
                    "Slug may only contain lowercase letters, digits and single hyphens",
                );
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value) {
            self.add(field, "Invalid email address");
        }
    }

    pub fn url(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value {
            let v = v.trim();
            if !v.is_empty()
                && !(v.starts_with("http://") || v.starts_with("https://") || v.starts_with('/'))
            {
                self.add(field, "Must be an absolute http(s) URL or a site path");
            }
        }
    }

    pub fn hex_color(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value {
            let digits = v.strip_prefix('#').unwrap_or("");
            let ok = (digits.len() == 6 || digits.len() == 3)
                && digits.chars().all(|c| c.is_ascii_hexdigit());
            if !ok {
                self.add(field, "Color must be a hex value like #1a2b3c");
            }
        }
    }

    pub fn non_negative(&mut self, field: &str, value: Option<i64>) {
        if matches!(value, Some(v) if v < 0) {
            self.add(field, format!("{} must not be negative", label(field)));
        }
    }

    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

fn label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_errors() {
        let mut v = Validator::new();
        v.required("title", "   ", 200);
        v.email("email", "nope");
        v.slug("slug", Some("Bad Slug"));
        match v.finish() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["title", "email", "slug"]);
                assert_eq!(errors[0].message, "Title is required");
            }
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_passes_when_clean() {
        let mut v = Validator::new();
        v.required("title", "Hello", 200);
        v.email("email", "reader@example.com");
        v.hex_color("color", Some("#ff8800"));
        v.url("purchase_url", Some("https://example.com/buy"));
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_slug_shape() {
        assert!(is_valid_slug("hello-world-1"));
        assert!(!is_valid_slug("-hello"));
        assert!(!is_valid_slug("hello--world"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.de"));
    }
}
