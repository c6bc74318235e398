//! Offset/limit windowing shared by every list endpoint.
//!
//! `offset` is a page index, not a row offset: the window for offset `n`
//! covers rows `n * limit .. (n + 1) * limit`. Malformed input never fails,
//! it is clamped to the nearest valid window.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Smallest page size any endpoint will serve.
pub const MIN_LIMIT: usize = 1;
/// Largest page size any endpoint will serve, including client-supplied limits.
pub const MAX_LIMIT: usize = 100;

/// A validated `(offset, limit)` pair for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    offset: usize,
    limit: usize,
}

impl PageWindow {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: limit.clamp(MIN_LIMIT, MAX_LIMIT),
        }
    }

    /// Build a window from the raw `offset` query value and the endpoint's fixed limit.
    pub fn parse(raw_offset: Option<&str>, limit: usize) -> Self {
        Self::new(parse_offset(raw_offset), limit)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// First row index covered by this window.
    pub fn start(&self) -> usize {
        self.offset.saturating_mul(self.limit)
    }

    /// One past the last row index covered by this window.
    pub fn end(&self) -> usize {
        self.start().saturating_add(self.limit)
    }

    /// `items[start..end]`, truncated to the input. Ordering is the caller's.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.start().min(items.len());
        let end = self.end().min(items.len());
        &items[start..end]
    }

    pub fn links(&self, total: usize) -> PageLinks {
        compute_links(self.offset, total, self.limit)
    }

    /// `LIMIT` bind value for SQL queries.
    pub fn sql_limit(&self) -> i64 {
        i64::try_from(self.limit).unwrap_or(i64::MAX)
    }

    /// `OFFSET` bind value for SQL queries (the row offset, i.e. `start`).
    pub fn sql_offset(&self) -> i64 {
        i64::try_from(self.start()).unwrap_or(i64::MAX)
    }
}

/// Parse a raw offset. Absent, non-numeric and negative values become `0`.
pub fn parse_offset(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|value| usize::try_from(value).ok())
        .unwrap_or(0)
}

/// Parse a client-supplied limit, clamped to `MIN_LIMIT..=MAX_LIMIT`.
/// Falls back to `default` when the value is absent or not a number.
pub fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
        Some(value) => value.clamp(MIN_LIMIT as i64, MAX_LIMIT as i64) as usize,
        None => default.clamp(MIN_LIMIT, MAX_LIMIT),
    }
}

/// Cursors pointing at the pages adjacent to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PageLinks {
    pub previous: Option<usize>,
    pub next: Option<usize>,
    pub has_more: bool,
}

/// `previous` is omitted on the first page; `next` is omitted once the
/// following page would start past `total`.
pub fn compute_links(offset: usize, total: usize, limit: usize) -> PageLinks {
    let limit = limit.max(MIN_LIMIT);
    let end = offset.saturating_add(1).saturating_mul(limit);
    let has_more = end < total;

    PageLinks {
        previous: offset.checked_sub(1),
        next: has_more.then(|| offset + 1),
        has_more,
    }
}

/// Response envelope for one page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub previous: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub next: Option<usize>,
    pub total: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Wrap rows already cut to `window` (e.g. by SQL `LIMIT`/`OFFSET`).
    pub fn new(items: Vec<T>, window: PageWindow, total: usize) -> Self {
        let links = window.links(total);
        Self {
            items,
            offset: window.offset(),
            previous: links.previous,
            next: links.next,
            total,
            limit: window.limit(),
            has_more: links.has_more,
        }
    }

    /// Cut `window` out of the full, already filtered and ordered candidate list.
    pub fn from_slice(all: &[T], window: PageWindow) -> Self
    where
        T: Clone,
    {
        Self::new(window.slice(all).to_vec(), window, all.len())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            offset: self.offset,
            previous: self.previous,
            next: self.next,
            total: self.total,
            limit: self.limit,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_offset_is_clamped_to_zero() {
        assert_eq!(PageWindow::parse(Some("-5"), 20).offset(), 0);
    }

    #[test]
    fn test_non_numeric_offset_is_clamped_to_zero() {
        assert_eq!(PageWindow::parse(Some("abc"), 20).offset(), 0);
        assert_eq!(PageWindow::parse(Some(""), 20).offset(), 0);
        assert_eq!(PageWindow::parse(None, 20).offset(), 0);
    }

    #[test]
    fn test_offset_is_a_page_index() {
        let window = PageWindow::parse(Some("3"), 20);
        assert_eq!(window.offset(), 3);
        assert_eq!(window.start(), 60);
        assert_eq!(window.end(), 80);
        assert_eq!(window.sql_offset(), 60);
        assert_eq!(window.sql_limit(), 20);
    }

    #[test]
    fn test_limit_is_clamped_to_bounds() {
        assert_eq!(PageWindow::new(0, 0).limit(), MIN_LIMIT);
        assert_eq!(PageWindow::new(0, 500).limit(), MAX_LIMIT);
        assert_eq!(parse_limit(Some("0"), 50), 1);
        assert_eq!(parse_limit(Some("1000"), 50), 100);
        assert_eq!(parse_limit(Some("-3"), 50), 1);
        assert_eq!(parse_limit(Some("x"), 50), 50);
        assert_eq!(parse_limit(None, 20), 20);
    }

    #[test]
    fn test_huge_offset_does_not_overflow() {
        let window = PageWindow::new(usize::MAX, 50);
        assert_eq!(window.start(), usize::MAX);
        assert!(window.slice(&[1, 2, 3]).is_empty());
        assert_eq!(window.sql_offset(), i64::MAX);
    }

    #[test]
    fn test_first_page_of_125_items() {
        let items: Vec<usize> = (0..125).collect();
        let window = PageWindow::parse(Some("0"), 50);
        let page = Page::from_slice(&items, window);

        assert_eq!(page.items.len(), 50);
        assert_eq!(page.items[0], 0);
        assert_eq!(page.next, Some(1));
        assert_eq!(page.previous, None);
        assert!(page.has_more);
        assert_eq!(page.total, 125);
    }

    #[test]
    fn test_last_partial_page_of_125_items() {
        let items: Vec<usize> = (0..125).collect();
        let window = PageWindow::parse(Some("2"), 50);
        assert_eq!(window.start(), 100);
        assert_eq!(window.end(), 150);

        let page = Page::from_slice(&items, window);
        assert_eq!(page.items, (100..125).collect::<Vec<_>>());
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(1));
        assert!(!page.has_more);
    }

    #[test]
    fn test_out_of_range_offset_yields_empty_page_with_true_total() {
        let items: Vec<usize> = (0..30).collect();
        let page = Page::from_slice(&items, PageWindow::new(9, 20));

        assert!(page.items.is_empty());
        assert_eq!(page.total, 30);
        assert_eq!(page.previous, Some(8));
        assert_eq!(page.next, None);
        assert!(!page.has_more);
    }

    #[test]
    fn test_next_is_absent_when_page_ends_exactly_at_total() {
        let links = compute_links(1, 100, 50);
        assert_eq!(links.next, None);
        assert!(!links.has_more);
        assert_eq!(links.previous, Some(0));
    }

    #[test]
    fn test_following_next_terminates_within_page_count() {
        for total in [0usize, 1, 19, 20, 21, 49, 50, 51, 125, 1000] {
            for limit in [10usize, 20, 50] {
                let max_steps = total.div_ceil(limit);
                let mut offset = 0;
                let mut steps = 0;
                while let Some(next) = compute_links(offset, total, limit).next {
                    assert!(next > offset, "cursor must advance");
                    offset = next;
                    steps += 1;
                    assert!(steps <= max_steps, "total={total} limit={limit}");
                }
                assert!(steps <= max_steps);
            }
        }
    }

    #[test]
    fn test_slice_preserves_input_order() {
        let items = ["c", "a", "b", "d"];
        assert_eq!(PageWindow::new(0, 3).slice(&items), &["c", "a", "b"]);
        assert_eq!(PageWindow::new(1, 3).slice(&items), &["d"]);
    }

    #[test]
    fn test_first_page_omits_previous_in_json() {
        let page: Page<u8> = Page::new(vec![], PageWindow::new(0, 20), 0);
        let body = serde_json::to_value(&page).unwrap();
        assert!(body.get("previous").is_none());
        assert!(body.get("next").is_none());
        assert_eq!(body["limit"], 20);
        assert_eq!(body["has_more"], false);
    }

    #[test]
    fn test_map_keeps_cursor_fields() {
        let items: Vec<u32> = (0..45).collect();
        let page = Page::from_slice(&items, PageWindow::new(1, 20)).map(|n| n * 2);
        assert_eq!(page.items.first(), Some(&40));
        assert_eq!(page.previous, Some(0));
        assert_eq!(page.next, Some(2));
        assert_eq!(page.total, 45);
    }
}
