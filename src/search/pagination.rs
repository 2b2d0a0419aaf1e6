//! Page slicing for the published result set
//!
//! Pages are 1-based. Everything here is pure except [`Paginator`], which
//! only remembers the current page so it can be clamped when the result
//! count changes underneath it.

use serde::{Serialize, Serializer};

pub const PAGE_SIZE: usize = 50;

/// One entry of the page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Page(usize),
    /// One or more skipped pages
    Gap,
}

impl Serialize for PageMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageMarker::Page(n) => serializer.serialize_u64(*n as u64),
            PageMarker::Gap => serializer.serialize_str("..."),
        }
    }
}

/// `max(1, ceil(count / page_size))`
pub fn total_pages(count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    count.div_ceil(page_size).max(1)
}

pub fn clamp_page(page: usize, total: usize) -> usize {
    page.clamp(1, total.max(1))
}

/// First page, last page, and every page within two of `current`
///
/// A [`PageMarker::Gap`] stands in wherever consecutive entries are more
/// than one page apart.
pub fn visible_pages(current: usize, total: usize) -> Vec<PageMarker> {
    let total = total.max(1);
    let current = clamp_page(current, total);

    let mut markers = Vec::new();
    let mut previous: Option<usize> = None;
    for page in 1..=total {
        if page != 1 && page != total && page.abs_diff(current) > 2 {
            continue;
        }
        if let Some(prev) = previous {
            if page - prev > 1 {
                markers.push(PageMarker::Gap);
            }
        }
        markers.push(PageMarker::Page(page));
        previous = Some(page);
    }
    markers
}

/// The slice of results for one page plus the selector around it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageWindow<T> {
    pub items: Vec<T>,
    pub current_page: usize,
    pub total_pages: usize,
    /// Zero-based offset of the first item, `end` is exclusive
    pub start: usize,
    pub end: usize,
    pub visible_pages: Vec<PageMarker>,
}

impl<T> PageWindow<T> {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Slice `results` for `page`, clamping the page into range
pub fn paginate<T: Clone>(results: &[T], page: usize, page_size: usize) -> PageWindow<T> {
    let page_size = page_size.max(1);
    let total = total_pages(results.len(), page_size);
    let current = clamp_page(page, total);

    let start = ((current - 1) * page_size).min(results.len());
    let end = (start + page_size).min(results.len());

    PageWindow {
        items: results[start..end].to_vec(),
        current_page: current,
        total_pages: total,
        start,
        end,
        visible_pages: visible_pages(current, total),
    }
}

/// Current-page cursor that stays valid as the result count changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    result_count: usize,
    current: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            result_count: 0,
            current: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.result_count, self.page_size)
    }

    /// Recompute the page count; the current page only ever moves down
    pub fn set_result_count(&mut self, count: usize) {
        self.result_count = count;
        self.current = clamp_page(self.current, self.total_pages());
    }

    pub fn go_to(&mut self, page: usize) -> usize {
        self.current = clamp_page(page, self.total_pages());
        self.current
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.current + 1)
    }

    pub fn prev(&mut self) -> usize {
        self.go_to(self.current.saturating_sub(1))
    }

    pub fn first(&mut self) -> usize {
        self.go_to(1)
    }

    pub fn last(&mut self) -> usize {
        self.go_to(self.total_pages())
    }

    pub fn window<T: Clone>(&self, results: &[T]) -> PageWindow<T> {
        paginate(results, self.current, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageMarker::{Gap, Page};

    #[test]
    fn test_total_pages_never_zero() {
        assert_eq!(total_pages(0, 50), 1);
        assert_eq!(total_pages(50, 50), 1);
        assert_eq!(total_pages(51, 50), 2);
        assert_eq!(total_pages(250, 50), 5);
    }

    #[test]
    fn test_visible_pages_with_gaps() {
        assert_eq!(
            visible_pages(10, 20),
            vec![Page(1), Gap, Page(8), Page(9), Page(10), Page(11), Page(12), Gap, Page(20)]
        );
        assert_eq!(
            visible_pages(1, 7),
            vec![Page(1), Page(2), Page(3), Gap, Page(7)]
        );
    }

    #[test]
    fn test_no_gap_for_adjacent_pages() {
        assert_eq!(
            visible_pages(4, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5)]
        );
        assert_eq!(visible_pages(1, 1), vec![Page(1)]);
        // A single skipped page still gets a marker
        assert_eq!(
            visible_pages(5, 9),
            vec![Page(1), Gap, Page(3), Page(4), Page(5), Page(6), Page(7), Gap, Page(9)]
        );
    }

    #[test]
    fn test_paginate_clamps_page() {
        let results: Vec<u32> = (0..120).collect();

        let last = paginate(&results, 99, PAGE_SIZE);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.items.len(), 20);
        assert_eq!(last.start, 100);
        assert!(!last.has_next());

        let first = paginate(&results, 0, PAGE_SIZE);
        assert_eq!(first.current_page, 1);
        assert_eq!(first.items[0], 0);
        assert!(!first.has_previous());
    }

    #[test]
    fn test_paginate_empty() {
        let window = paginate::<u32>(&[], 3, PAGE_SIZE);
        assert_eq!(window.current_page, 1);
        assert_eq!(window.total_pages, 1);
        assert!(window.items.is_empty());
    }

    #[test]
    fn test_paginator_clamps_when_results_shrink() {
        let mut pager = Paginator::default();
        pager.set_result_count(500);
        assert_eq!(pager.last(), 10);

        pager.set_result_count(120);
        assert_eq!(pager.current_page(), 3);

        assert_eq!(pager.next(), 3);
        assert_eq!(pager.prev(), 2);
        assert_eq!(pager.first(), 1);
        assert_eq!(pager.prev(), 1);
    }

    #[test]
    fn test_marker_serialization() {
        let json = serde_json::to_string(&vec![Page(1), Gap, Page(9)]).unwrap();
        assert_eq!(json, r#"[1,"...",9]"#);
    }
}
