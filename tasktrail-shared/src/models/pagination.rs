//! Page requests and the pagination envelope
//!
//! Handlers validate a [`PageRequest`], pass `limit()` / `offset()` to a
//! repository `list` call, and wrap the result in a [`Page`].

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Highest page a request may ask for; keeps `offset()` far from `i64` overflow
pub const MAX_PAGE: i64 = 1_000_000;

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Requested page, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, max = 1_000_000, message = "page must be between 1 and 1000000"))]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "page_size must be between 1 and 100"))]
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page.min(MAX_PAGE) - 1)
            .max(0)
            .saturating_mul(self.page_size)
    }
}

/// Pagination envelope returned with every list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let page_size = request.page_size.max(1);
        let total_pages = (total.max(0) + page_size - 1) / page_size;

        Self {
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            pagination: Pagination::new(request, total),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, PageRequest::default());
        assert_eq!(request.limit(), 20);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let request = PageRequest::new(3, 25);
        assert_eq!(request.limit(), 25);
        assert_eq!(request.offset(), 50);
    }

    #[test]
    fn test_validation_bounds() {
        assert!(PageRequest::new(1, 100).validate().is_ok());
        assert!(PageRequest::new(0, 20).validate().is_err());
        assert!(PageRequest::new(1, 0).validate().is_err());
        assert!(PageRequest::new(1, 101).validate().is_err());
        assert!(PageRequest::new(MAX_PAGE, 100).validate().is_ok());
        assert!(PageRequest::new(MAX_PAGE + 1, 100).validate().is_err());
    }

    #[test]
    fn test_huge_page_is_rejected_without_overflow() {
        let request: PageRequest =
            serde_json::from_str(r#"{"page": 9223372036854775807, "page_size": 100}"#).unwrap();
        assert!(request.validate().is_err());
        assert_eq!(request.offset(), (MAX_PAGE - 1) * 100);

        let unchecked = PageRequest::new(i64::MAX, i64::MAX);
        assert_eq!(unchecked.offset(), i64::MAX);
    }

    #[test]
    fn test_envelope_math() {
        let pagination = Pagination::new(PageRequest::new(2, 10), 45);
        assert_eq!(pagination.total_pages, 5);
        assert!(pagination.has_next);
        assert!(pagination.has_prev);

        let last = Pagination::new(PageRequest::new(5, 10), 45);
        assert!(!last.has_next);

        let exact = Pagination::new(PageRequest::new(1, 10), 40);
        assert_eq!(exact.total_pages, 4);
    }

    #[test]
    fn test_empty_result() {
        let pagination = Pagination::new(PageRequest::default(), 0);
        assert_eq!(pagination.total_pages, 0);
        assert!(!pagination.has_next);
        assert!(!pagination.has_prev);
    }
}
