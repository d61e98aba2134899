//! Domain models.
//!
//! Internal domain types. The HTTP layer has its own DTOs with camelCase
//! renames; these mirror the persisted shape.

pub mod action;
pub mod identity;
pub mod invite;
pub mod membership;
pub mod team;
pub mod tenant;
pub mod verification;

use serde::{Deserialize, Serialize};

/// Page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Upper bound on a single page.
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

/// A page of results together with the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }

    /// Number of pages needed to show `total` rows.
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_inputs() {
        let p = Pagination::new(0, 10_000);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, Pagination::MAX_LIMIT);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page::new(vec![1, 2], 41, Pagination::new(1, 20));
        assert_eq!(page.pages(), 3);
    }
}
