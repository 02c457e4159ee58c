//! The publish-state rule shared by every publishable content type.
//!
//! `published_at` is set exactly when `is_published` is true.

use chrono::{DateTime, Utc};

/// Publish timestamp to persist after a write
///
/// - not published: cleared
/// - explicit date supplied: that date, also when re-publishing
/// - staying published: unchanged
/// - draft becoming published: `now`
pub fn resolve_published_at(
    current: Option<&str>,
    was_published: bool,
    is_published: bool,
    explicit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<String> {
    if !is_published {
        return None;
    }
    if let Some(date) = explicit {
        return Some(date.to_rfc3339());
    }
    match current {
        Some(existing) if was_published => Some(existing.to_string()),
        _ => Some(now.to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_draft_to_published_uses_now() {
        let now = at(10);
        assert_eq!(
            resolve_published_at(None, false, true, None, now),
            Some(now.to_rfc3339())
        );
    }

    #[test]
    fn test_unpublish_clears_date() {
        let stored = at(1).to_rfc3339();
        assert_eq!(
            resolve_published_at(Some(&stored), true, false, None, at(10)),
            None
        );
        assert_eq!(resolve_published_at(None, false, false, None, at(10)), None);
    }

    #[test]
    fn test_staying_published_keeps_date() {
        let stored = at(1).to_rfc3339();
        assert_eq!(
            resolve_published_at(Some(&stored), true, true, None, at(10)),
            Some(stored)
        );
    }

    #[test]
    fn test_explicit_date_overrides() {
        let stored = at(1).to_rfc3339();
        let explicit = at(5);
        assert_eq!(
            resolve_published_at(Some(&stored), true, true, Some(explicit), at(10)),
            Some(explicit.to_rfc3339())
        );
        assert_eq!(
            resolve_published_at(None, false, true, Some(explicit), at(10)),
            Some(explicit.to_rfc3339())
        );
    }
}
