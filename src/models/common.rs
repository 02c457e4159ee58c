use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// Sort direction for list endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Query parameters shared by the public and admin content lists
///
/// `tags` is a comma-separated list of tag slugs; `from`/`to` bound the
/// publish date and accept RFC 3339 or `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub tags: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<SortDirection>,
    /// Admin only: `published`, `draft` or `all`
    pub status: Option<String>,
    pub featured: Option<bool>,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: usize, page: u32, per_page: u32) -> Self {
        let total_pages = (total as u32).div_ceil(per_page.max(1));
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }

    pub fn empty(page: u32, per_page: u32) -> Self {
        Self::new(Vec::new(), 0, page, per_page)
    }
}

/// Publish toggle used by the PATCH endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Outcome of an operation applied to an explicit id list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdListRequest {
    pub ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let query = ListQuery {
            page: Some(0),
            per_page: Some(1000),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), MAX_PER_PAGE);
        assert_eq!(ListQuery::default().per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_total_pages() {
        let page: Paginated<u8> = Paginated::new(vec![], 21, 3, 10);
        assert_eq!(page.total_pages, 3);
        let page: Paginated<u8> = Paginated::empty(1, 10);
        assert_eq!(page.total_pages, 0);
    }
}
