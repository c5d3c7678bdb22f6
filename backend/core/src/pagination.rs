//! Paged listings with "has more" detection.
//!
//! A page asks storage for one record more than it returns; the presence of
//! that extra record is what tells the caller another page exists, so no
//! separate count query is needed.

use serde::Serialize;

use crate::error::DevAuthError;

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Largest page size a caller may ask for.
pub const MAX_PER_PAGE: usize = 500;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, per_page: DEFAULT_PER_PAGE }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Parse raw query values. Absent values fall back to page 1 and
    /// `default_per_page`.
    pub fn from_query(
        page: Option<&str>,
        per_page: Option<&str>,
        default_per_page: usize,
        max_per_page: usize,
    ) -> Result<Self, DevAuthError> {
        let page = match page {
            None => 1,
            Some(raw) => parse_positive(raw)
                .ok_or_else(|| DevAuthError::validation("invalid page parameter"))?,
        };
        let per_page = match per_page {
            None => default_per_page,
            Some(raw) => parse_positive(raw)
                .filter(|n| *n <= max_per_page)
                .ok_or_else(|| DevAuthError::validation("invalid per_page parameter"))?,
        };
        // storage offsets are signed 64-bit
        let offset = (page - 1).checked_mul(per_page).filter(|n| i64::try_from(*n).is_ok());
        if offset.is_none() {
            return Err(DevAuthError::validation("invalid page parameter"));
        }
        Ok(Self { page, per_page })
    }

    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Records to request from storage: one beyond the page size.
    pub fn limit(&self) -> usize {
        self.per_page.saturating_add(1)
    }

    /// Trim a storage result fetched with [`PageRequest::limit`] to the page.
    pub fn paginate<T>(&self, mut items: Vec<T>) -> Page<T> {
        let has_more = items.len() > self.per_page;
        items.truncate(self.per_page);
        Page { items, has_more, page: self.page, per_page: self.per_page }
    }
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}

/// One page of results plus the side output the boundary turns into links.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_of_three_items() {
        let req = PageRequest::new(2, 2);
        assert_eq!(req.skip(), 2);
        assert_eq!(req.limit(), 3);

        // storage returned what was left after skipping two
        let page = req.paginate(vec!["c"]);
        assert_eq!(page.items, vec!["c"]);
        assert!(!page.has_more);
        assert!(page.has_prev());
    }

    #[test]
    fn first_page_of_three_items() {
        let req = PageRequest::new(1, 2);
        assert_eq!(req.skip(), 0);
        let page = req.paginate(vec!["a", "b", "c"]);
        assert_eq!(page.items, vec!["a", "b"]);
        assert!(page.has_more);
        assert!(!page.has_prev());
    }

    #[test]
    fn query_defaults() {
        let req = PageRequest::from_query(None, None, DEFAULT_PER_PAGE, MAX_PER_PAGE).unwrap();
        assert_eq!(req, PageRequest::default());
        assert_eq!(req.limit(), DEFAULT_PER_PAGE + 1);
    }

    #[test]
    fn largest_addressable_page_is_accepted() {
        let last = (i64::MAX as u64 + 1).to_string();
        let req = PageRequest::from_query(Some(&last), Some("1"), 20, 500).unwrap();
        assert_eq!(req.skip(), i64::MAX as usize);
    }

    #[test]
    fn query_rejects_bad_values() {
        for (page, per_page) in [
            (Some("0"), None),
            (Some("abc"), None),
            (None, Some("0")),
            (None, Some("501")),
            (None, Some("-3")),
            (Some("9223372036854775809"), Some("1")),
            (Some("18446744073709551615"), Some("2")),
        ] {
            let err = PageRequest::from_query(page, per_page, 20, 500).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::ValidationFailed, "{page:?} {per_page:?}");
        }
    }
}
