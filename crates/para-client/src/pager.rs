//! # Pagination Descriptor
//!
//! [`Pager`] carries the pagination and sorting parameters sent with list
//! and search calls, and receives the result metadata written back by the
//! server response envelope (`totalHits` → `count`, `lastKey` cursor).
//!
//! Defaults match the server's: page 1, limit 30, descending order.

use serde::{Deserialize, Serialize};

/// Pagination/sort parameters for list and search calls.
///
/// Pass a `&mut Pager` to a paged call to receive the total hit count and
/// the next-page cursor; the same instance can then be passed again to
/// fetch the next page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pager {
    /// Page number, starting from 1.
    pub page: u64,

    /// Total number of results, populated by the server after a call.
    pub count: u64,

    /// Field to sort by. `None` means the server default (relevance/docid).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortby: Option<String>,

    /// Descending sort order.
    pub desc: bool,

    /// Maximum number of items per page.
    pub limit: u32,

    /// Pagination cursor, populated by the server after a call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_key: Option<String>,

    /// Optional projection — restricts the fields returned for each object.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub select: Vec<String>,
}

impl Pager {
    /// Create a pager with default paging parameters (page 1, limit 30,
    /// descending).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pager with a custom page size.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Create a pager starting at a given page with a custom page size.
    pub fn with_page(page: u64, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    /// Set the sort field, consuming and returning the pager.
    pub fn sorted_by(mut self, sortby: impl Into<String>) -> Self {
        self.sortby = Some(sortby.into());
        self
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self {
            page: 1,
            count: 0,
            sortby: None,
            desc: true,
            limit: 30,
            last_key: None,
            select: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pager_defaults() {
        let p = Pager::new();
        assert_eq!(p.page, 1);
        assert_eq!(p.count, 0);
        assert_eq!(p.limit, 30);
        assert!(p.desc);
        assert!(p.sortby.is_none());
        assert!(p.last_key.is_none());
        assert!(p.select.is_empty());
    }

    #[test]
    fn pager_with_limit() {
        let p = Pager::with_limit(2);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 2);
        assert!(p.desc);
    }

    #[test]
    fn pager_with_page() {
        let p = Pager::with_page(3, 10);
        assert_eq!(p.page, 3);
        assert_eq!(p.limit, 10);
    }

    #[test]
    fn pager_sorted_by() {
        let p = Pager::new().sorted_by("timestamp");
        assert_eq!(p.sortby.as_deref(), Some("timestamp"));
    }
}
