//! Page arithmetic for product listings.

use serde::Serialize;

/// Position within a paged listing.
///
/// Pages are 1-based. A listing with no items still has one (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub last_page: u32,
}

impl Pagination {
    /// Build pagination for `total_items`, clamping `page` into `1..=last_page`.
    #[must_use]
    pub fn new(page: u32, per_page: u32, total_items: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = u32::try_from(total_items.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);
        Self {
            current_page: page.clamp(1, last_page),
            per_page,
            total_items,
            last_page,
        }
    }

    /// Rows to skip for the current page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.current_page - 1) * i64::from(self.per_page)
    }

    /// Rows to fetch for the current page.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }

    #[must_use]
    pub const fn previous_page(&self) -> u32 {
        self.current_page.saturating_sub(1)
    }

    #[must_use]
    pub const fn next_page(&self) -> u32 {
        self.current_page.saturating_add(1)
    }
}
