//! URL slugs and their per-table uniqueness.
//!
//! The uniqueness check is check-then-insert; the `UNIQUE` index on every
//! `slug` column is what finally rejects a concurrent duplicate.

use sqlx::SqliteConnection;

use crate::error::{AppError, Result};
use crate::validation::FieldError;

const FALLBACK_SLUG: &str = "untitled";

/// Tables that own a slug column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugScope {
    Posts,
    Tags,
    Books,
    Engagements,
    Products,
}

impl SlugScope {
    pub fn table(&self) -> &'static str {
        match self {
            SlugScope::Posts => "blog_posts",
            SlugScope::Tags => "tags",
            SlugScope::Books => "books",
            SlugScope::Engagements => "engagements",
            SlugScope::Products => "products",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlugScope::Posts => "Post",
            SlugScope::Tags => "Tag",
            SlugScope::Books => "Book",
            SlugScope::Engagements => "Engagement",
            SlugScope::Products => "Product",
        }
    }
}

/// Lower-case, collapse every run of non-alphanumerics into one hyphen, trim hyphens.
///
/// Common Latin accents are folded to their ASCII base letter; anything else
/// outside `[a-z0-9]` acts as a separator.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Like [`slugify`] but never empty
pub fn slugify_or_default(input: &str) -> String {
    let slug = slugify(input);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' | 'ń' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ß' => 's',
        'ł' => 'l',
        'ś' | 'š' => 's',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

async fn slug_taken(
    conn: &mut SqliteConnection,
    scope: SlugScope,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE slug = ? AND (? IS NULL OR id <> ?)",
        scope.table()
    );
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// First free slug among `base`, `base-1`, `base-2`, ...
///
/// `exclude_id` lets a row being edited keep its own slug.
pub async fn unique_slug(
    conn: &mut SqliteConnection,
    scope: SlugScope,
    base: &str,
    exclude_id: Option<&str>,
) -> Result<String> {
    let base = slugify_or_default(base);
    let mut candidate = base.clone();
    let mut suffix = 0u32;

    while slug_taken(conn, scope, &candidate, exclude_id).await? {
        suffix += 1;
        candidate = format!("{}-{}", base, suffix);
    }

    if suffix > 0 {
        tracing::debug!(
            "{} slug {} taken, using {}",
            scope.label(),
            base,
            candidate
        );
    }
    Ok(candidate)
}

/// An explicitly requested slug is used as-is or rejected, never suffixed
pub async fn claim_slug(
    conn: &mut SqliteConnection,
    scope: SlugScope,
    requested: &str,
    exclude_id: Option<&str>,
) -> Result<String> {
    let slug = slugify(requested);
    if slug.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "slug",
            "Slug must contain at least one letter or digit",
        )]));
    }
    if slug_taken(conn, scope, &slug, exclude_id).await? {
        return Err(AppError::Validation(vec![FieldError::new(
            "slug",
            "Slug is already in use",
        )]));
    }
    Ok(slug)
}
