//! In-memory filtering, sorting and pagination of content lists.
//!
//! Published lists come out of the content cache, so filters run over
//! the cached `Vec` rather than in SQL.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{ListQuery, Paginated, SortDirection};
use crate::services::slug::slugify;
use crate::validation::FieldError;

/// Field a list can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    PublishedAt,
    CreatedAt,
    UpdatedAt,
    Title,
    ReadingTime,
    SortOrder,
    Price,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "published_at" => Some(SortField::PublishedAt),
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "reading_time" => Some(SortField::ReadingTime),
            "sort_order" => Some(SortField::SortOrder),
            "price" => Some(SortField::Price),
            _ => None,
        }
    }
}

/// Content that can go through [`apply`]
pub trait Listable {
    fn title(&self) -> &str;
    fn search_fields(&self) -> Vec<&str>;
    fn is_published(&self) -> bool;
    fn published_at(&self) -> Option<&str>;
    fn is_featured(&self) -> bool;
    fn created_at(&self) -> &str;
    fn updated_at(&self) -> &str;

    fn tag_slugs(&self) -> Vec<&str> {
        Vec::new()
    }

    fn reading_time(&self) -> Option<i64> {
        None
    }

    fn sort_order(&self) -> Option<i64> {
        None
    }

    fn price(&self) -> Option<i64> {
        None
    }

    /// Ordering used when the query names none
    fn default_sort() -> (SortField, SortDirection)
    where
        Self: Sized,
    {
        (SortField::PublishedAt, SortDirection::Desc)
    }
}

/// Parse a `from`/`to` bound: RFC 3339, or a bare date covering the whole day
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time).and_utc())
}

/// `%needle%` for a case-insensitive `LIKE ... ESCAPE '\'` match, with `%` and `_` taken literally
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// SQL `OFFSET` for a 1-based page, widened so large page numbers cannot overflow
pub fn sql_offset(page: u32, per_page: u32) -> i64 {
    (i64::from(page.max(1)) - 1) * i64::from(per_page)
}

/// Parse an optional query bound, reporting a field error on bad input
pub fn bound(field: &str, value: Option<&str>, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse_date_bound(v, end_of_day).map(Some).ok_or_else(|| {
            AppError::Validation(vec![FieldError::new(
                field,
                "Expected an RFC 3339 timestamp or YYYY-MM-DD",
            )])
        }),
    }
}

fn published_instant<T: Listable>(item: &T) -> Option<DateTime<Utc>> {
    item.published_at()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn compare<T: Listable>(a: &T, b: &T, field: SortField) -> Ordering {
    match field {
        SortField::PublishedAt => a.published_at().cmp(&b.published_at()),
        SortField::CreatedAt => a.created_at().cmp(b.created_at()),
        SortField::UpdatedAt => a.updated_at().cmp(b.updated_at()),
        SortField::Title => a.title().to_lowercase().cmp(&b.title().to_lowercase()),
        SortField::ReadingTime => a.reading_time().cmp(&b.reading_time()),
        SortField::SortOrder => a.sort_order().cmp(&b.sort_order()),
        SortField::Price => a.price().cmp(&b.price()),
    }
}

/// Filter, sort and paginate `items` according to `query`
///
/// A page past the end yields an empty `items` list.
pub fn apply<T: Listable + Clone>(items: &[T], query: &ListQuery) -> Result<Paginated<T>> {
    let page = query.page();
    let per_page = query.per_page();

    let status = query.status.as_deref().map(str::trim).unwrap_or("all");
    if !matches!(status, "all" | "published" | "draft") {
        return Err(AppError::Validation(vec![FieldError::new(
            "status",
            "Status must be published, draft or all",
        )]));
    }

    let (default_field, default_dir) = T::default_sort();
    let field = match query.sort_by.as_deref().filter(|s| !s.is_empty()) {
        None => default_field,
        Some(s) => SortField::parse(s).ok_or_else(|| {
            AppError::Validation(vec![FieldError::new("sort_by", "Unknown sort field")])
        })?,
    };
    let direction = query.sort_dir.unwrap_or(if query.sort_by.is_some() {
        SortDirection::Desc
    } else {
        default_dir
    });

    let from = bound("from", query.from.as_deref(), false)?;
    let to = bound("to", query.to.as_deref(), true)?;

    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let wanted_tags: Vec<String> = query
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(slugify)
        .filter(|s| !s.is_empty())
        .collect();

    let mut matched: Vec<&T> = items
        .iter()
        .filter(|item| match status {
            "published" => item.is_published(),
            "draft" => !item.is_published(),
            _ => true,
        })
        .filter(|item| query.featured.map_or(true, |f| item.is_featured() == f))
        .filter(|item| {
            needle.as_ref().map_or(true, |needle| {
                item.search_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle.as_str()))
            })
        })
        .filter(|item| {
            wanted_tags.is_empty()
                || item
                    .tag_slugs()
                    .iter()
                    .any(|slug| wanted_tags.iter().any(|w| w == slug))
        })
        .filter(|item| {
            if from.is_none() && to.is_none() {
                return true;
            }
            match published_instant(*item) {
                None => false,
                Some(at) => from.map_or(true, |f| at >= f) && to.map_or(true, |t| at <= t),
            }
        })
        .collect();

    matched.sort_by(|a, b| {
        let ordering = compare(*a, *b, field);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let total = matched.len();
    let offset = (page as usize - 1) * per_page as usize;
    let items = matched
        .into_iter()
        .skip(offset)
        .take(per_page as usize)
        .cloned()
        .collect();

    Ok(Paginated::new(items, total, page, per_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Hello"), "%hello%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[test]
    fn test_sql_offset() {
        assert_eq!(sql_offset(1, 10), 0);
        assert_eq!(sql_offset(3, 25), 50);
        assert_eq!(sql_offset(u32::MAX, 100), (i64::from(u32::MAX) - 1) * 100);
    }

    #[derive(Debug, Clone)]
    struct Item {
        title: String,
        body: String,
        published_at: Option<String>,
        featured: bool,
        tags: Vec<String>,
        minutes: i64,
    }

    impl Listable for Item {
        fn title(&self) -> &str {
            &self.title
        }
        fn search_fields(&self) -> Vec<&str> {
            vec![self.title.as_str(), self.body.as_str()]
        }
        fn is_published(&self) -> bool {
            self.published_at.is_some()
        }
        fn published_at(&self) -> Option<&str> {
            self.published_at.as_deref()
        }
        fn is_featured(&self) -> bool {
            self.featured
        }
        fn created_at(&self) -> &str {
            "2024-01-01T00:00:00+00:00"
        }
        fn updated_at(&self) -> &str {
            "2024-01-01T00:00:00+00:00"
        }
        fn tag_slugs(&self) -> Vec<&str> {
            self.tags.iter().map(String::as_str).collect()
        }
        fn reading_time(&self) -> Option<i64> {
            Some(self.minutes)
        }
    }

    fn item(title: &str, day: Option<u32>, tags: &[&str]) -> Item {
        Item {
            title: title.to_string(),
            body: format!("All about {}", title.to_lowercase()),
            published_at: day.map(|d| format!("2024-03-{:02}T09:00:00+00:00", d)),
            featured: false,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            minutes: day.unwrap_or(0) as i64,
        }
    }

    fn sample() -> Vec<Item> {
        vec![
            item("Rust ownership", Some(1), &["rust"]),
            item("Async in practice", Some(5), &["rust", "async"]),
            item("Team workshops", Some(10), &["teams"]),
            item("Unfinished draft", None, &["rust"]),
        ]
    }

    fn titles(page: &Paginated<Item>) -> Vec<&str> {
        page.items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let page = apply(&sample(), &ListQuery::default()).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items[0].title, "Team workshops");
        assert_eq!(page.items[3].title, "Unfinished draft");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let query = ListQuery {
            search: Some("ASYNC".to_string()),
            ..Default::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(titles(&page), vec!["Async in practice"]);
    }

    #[test]
    fn test_tag_filter_matches_any() {
        let query = ListQuery {
            tags: Some("async, Teams".to_string()),
            ..Default::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(titles(&page), vec!["Team workshops", "Async in practice"]);
    }

    #[test]
    fn test_date_range_and_status() {
        let query = ListQuery {
            from: Some("2024-03-02".to_string()),
            to: Some("2024-03-05".to_string()),
            ..Default::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(titles(&page), vec!["Async in practice"]);

        let drafts = ListQuery {
            status: Some("draft".to_string()),
            ..Default::default()
        };
        let page = apply(&sample(), &drafts).unwrap();
        assert_eq!(titles(&page), vec!["Unfinished draft"]);
    }

    #[test]
    fn test_sort_by_title_ascending() {
        let query = ListQuery {
            sort_by: Some("title".to_string()),
            sort_dir: Some(SortDirection::Asc),
            ..Default::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(
            titles(&page),
            vec![
                "Async in practice",
                "Rust ownership",
                "Team workshops",
                "Unfinished draft"
            ]
        );
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let query = ListQuery {
            page: Some(5),
            per_page: Some(2),
            ..Default::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let query = ListQuery {
            sort_by: Some("popularity".to_string()),
            ..Default::default()
        };
        assert!(apply(&sample(), &query).is_err());

        let query = ListQuery {
            from: Some("last week".to_string()),
            ..Default::default()
        };
        assert!(apply(&sample(), &query).is_err());
    }

    #[test]
    fn test_parse_date_bound() {
        let start = parse_date_bound("2024-03-02", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-02T00:00:00+00:00");
        let end = parse_date_bound("2024-03-02", true).unwrap();
        assert!(end > start);
        assert!(parse_date_bound("2024-03-02T10:00:00+02:00", false).is_some());
        assert!(parse_date_bound("nope", false).is_none());
    }
}
