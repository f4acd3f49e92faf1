/// Database models
///
/// Each model owns its SQL: `impl Model { pub async fn create(..) }` style
/// methods taking any `sqlx::PgExecutor`, so they run equally on the pool or
/// inside a transaction. The [`crate::db::postgres::PgStore`] composes them
/// behind the `Store` trait.
///
/// # Soft delete
///
/// Families and babies are never hard-deleted. Visibility is decided in one
/// place: [`SoftDelete::is_visible`] for loaded rows and [`visible`] for SQL
/// predicates. Everything that filters deleted rows goes through these two.

use chrono::{DateTime, Utc};

pub mod activity;
pub mod baby;
pub mod family;
pub mod invite;
pub mod membership;
pub mod refresh_token;
pub mod user;

/// Rows that can be soft-deleted
pub trait SoftDelete {
    /// Deletion timestamp, `None` while the row is live
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Whether the row is visible to reads and writes
    fn is_visible(&self) -> bool {
        self.deleted_at().is_none()
    }
}

/// SQL predicate selecting live rows of the table aliased `alias`
///
/// ```
/// assert_eq!(twocare_shared::models::visible("f"), "f.deleted_at IS NULL");
/// ```
pub fn visible(alias: &str) -> String {
    format!("{}.deleted_at IS NULL", alias)
}

/// Offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub page: u32,

    /// Rows per page
    pub page_size: u32,
}

impl Page {
    /// Default page number
    pub const DEFAULT_PAGE: u32 = 1;

    /// Default rows per page
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    /// Largest accepted page size
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(Option<DateTime<Utc>>);

    impl SoftDelete for Row {
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.0
        }
    }

    #[test]
    fn test_soft_delete_visibility() {
        assert!(Row(None).is_visible());
        assert!(!Row(Some(Utc::now())).is_visible());
    }

    #[test]
    fn test_page_window() {
        let page = Page::default();
        assert_eq!(page.limit(), 20);
        assert_eq!(page.offset(), 0);

        let page = Page { page: 3, page_size: 50 };
        assert_eq!(page.offset(), 100);
    }
}
