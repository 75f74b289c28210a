//! Pagination utilities for list endpoints
//!
//! Lists are assembled in memory from Redis sets and lists, so pagination is a
//! slice over an already sorted `Vec`.

use serde::Serialize;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    pub page_size: usize,
    /// Total number of pages
    pub total_pages: usize,
    /// Index of the first item on the page
    pub offset: usize,
}

/// Calculate pagination metadata from total results and requested page
///
/// The page is clamped to at least 1. Pages past the end are allowed and yield an
/// empty slice, matching what list clients expect when they over-scroll.
///
/// # Examples
/// ```
/// use yaktoon_api::pagination::calculate_pagination;
///
/// // 25 results at 10 per page = 3 pages
/// let p = calculate_pagination(25, 2, 10);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 10);
/// ```
pub fn calculate_pagination(total_results: usize, requested_page: usize, page_size: usize) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = total_results.div_ceil(page_size);
    let page = requested_page.max(1);

    Pagination {
        page,
        page_size,
        total_pages,
        offset: (page - 1).saturating_mul(page_size),
    }
}

impl Pagination {
    /// The items on this page
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset)
            .take(self.page_size)
            .cloned()
            .collect()
    }
}

/// `{items, page, pageSize, total, totalPages}` list envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T: Clone> Page<T> {
    pub fn from_sorted(items: &[T], requested_page: usize, page_size: usize) -> Self {
        let p = calculate_pagination(items.len(), requested_page, page_size);
        Self {
            items: p.slice(items),
            page: p.page,
            page_size: p.page_size,
            total: items.len(),
            total_pages: p.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(25, 2, 10);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 10);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(25, 0, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_huge_page_does_not_overflow() {
        let p = calculate_pagination(25, usize::MAX, 10);
        assert_eq!(p.page, usize::MAX);
        assert_eq!(p.offset, usize::MAX);

        let items: Vec<u32> = (1..=25).collect();
        let page = Page::from_sorted(&items, usize::MAX, 24);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 25);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, 12);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_page_slices_items() {
        let items: Vec<u32> = (1..=25).collect();
        let page = Page::from_sorted(&items, 3, 10);
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let past_end = Page::from_sorted(&items, 9, 10);
        assert!(past_end.items.is_empty());
    }
}
