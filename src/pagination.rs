//! Client-side page math over a full, already-sorted result set.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Posts per page (a 3x3 grid).
pub const PAGE_SIZE: usize = 9;
/// Page numbers shown in the navigation strip.
pub const WINDOW_SIZE: usize = 5;

/// `ceil(n / page_size)`; zero records means zero pages.
pub fn total_pages(n: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    n.div_ceil(page_size)
}

/// Records on 1-indexed `page`, clamped to the slice bounds.
pub fn current_slice<T>(all: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= all.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(all.len());
    &all[start..end]
}

/// Pull `current` back onto the last page after the result set shrank.
pub fn clamp_current_page(current: usize, total: usize) -> usize {
    if total > 0 && current > total {
        total
    } else {
        current.max(1)
    }
}

/// Contiguous page numbers around `current`, saturating at either end instead of
/// shrinking.
pub fn visible_window(current: usize, total: usize, window: usize) -> RangeInclusive<usize> {
    if total == 0 || window == 0 {
        return RangeInclusive::new(1, 0);
    }
    let mut start = current.saturating_sub(2).max(1);
    let end = total.min(start.saturating_add(window - 1));
    if end < start || end - start < window - 1 {
        start = (end + 1).saturating_sub(window).max(1);
    }
    start..=end
}

/// Navigation metadata for one rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub current: usize,
    pub total_pages: usize,
    pub pages: Vec<usize>,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageWindow {
    pub fn derive(current: usize, total_records: usize) -> Self {
        let total = total_pages(total_records, PAGE_SIZE);
        let current = if total == 0 { 1 } else { clamp_current_page(current, total) };
        Self {
            current,
            total_pages: total,
            pages: visible_window(current, total, WINDOW_SIZE).collect(),
            has_prev: current > 1,
            has_next: current < total,
        }
    }

    /// A single page (or none) needs no navigation strip.
    pub fn should_display(&self) -> bool { self.total_pages > 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_is_ceiling() {
        assert_eq!(total_pages(0, PAGE_SIZE), 0);
        for n in 1..200usize {
            assert_eq!(total_pages(n, PAGE_SIZE), (n + PAGE_SIZE - 1) / PAGE_SIZE, "n={n}");
        }
        assert_eq!(total_pages(9, PAGE_SIZE), 1);
        assert_eq!(total_pages(10, PAGE_SIZE), 2);
    }

    #[test]
    fn slices_partition_the_sequence() {
        for n in 0..60usize {
            let all: Vec<usize> = (0..n).collect();
            let total = total_pages(n, PAGE_SIZE);
            let mut joined = Vec::new();
            for page in 1..=total {
                let slice = current_slice(&all, page, PAGE_SIZE);
                assert_eq!(slice.len(), PAGE_SIZE.min(n - (page - 1) * PAGE_SIZE));
                joined.extend_from_slice(slice);
            }
            assert_eq!(joined, all);
        }
    }

    #[test]
    fn out_of_range_pages_are_empty() {
        let all: Vec<u8> = (0..20).collect();
        assert!(current_slice(&all, 0, PAGE_SIZE).is_empty());
        assert!(current_slice(&all, 4, PAGE_SIZE).is_empty());
        assert!(current_slice(&all, usize::MAX, PAGE_SIZE).is_empty());
        assert_eq!(current_slice(&all, 3, PAGE_SIZE), &[18, 19]);
    }

    #[test]
    fn clamp_moves_to_new_last_page() {
        assert_eq!(clamp_current_page(3, 2), 2);
        assert_eq!(clamp_current_page(3, 0), 3);
        assert_eq!(clamp_current_page(2, 5), 2);
        assert_eq!(clamp_current_page(0, 5), 1);
    }

    #[test]
    fn window_length_is_min_of_five_and_total() {
        for total in 0..30usize {
            for current in 1..=total.max(1) {
                let len = visible_window(current, total, WINDOW_SIZE).count();
                assert_eq!(len, WINDOW_SIZE.min(total), "current={current} total={total}");
            }
        }
    }

    #[test]
    fn window_centers_then_saturates() {
        assert_eq!(visible_window(1, 10, WINDOW_SIZE), 1..=5);
        assert_eq!(visible_window(2, 10, WINDOW_SIZE), 1..=5);
        assert_eq!(visible_window(6, 10, WINDOW_SIZE), 4..=8);
        assert_eq!(visible_window(9, 10, WINDOW_SIZE), 6..=10);
        assert_eq!(visible_window(10, 10, WINDOW_SIZE), 6..=10);
        assert_eq!(visible_window(2, 3, WINDOW_SIZE), 1..=3);
    }

    #[test]
    fn window_clamps_out_of_range_current() {
        assert_eq!(visible_window(40, 3, WINDOW_SIZE), 1..=3);
        assert_eq!(visible_window(0, 8, WINDOW_SIZE), 1..=5);
        assert_eq!(visible_window(1, 0, WINDOW_SIZE).count(), 0);
    }

    #[test]
    fn page_window_flags() {
        let w = PageWindow::derive(1, 20);
        assert_eq!(w.total_pages, 3);
        assert_eq!(w.pages, vec![1, 2, 3]);
        assert!(!w.has_prev && w.has_next && w.should_display());

        let last = PageWindow::derive(3, 18);
        assert_eq!(last.current, 2);
        assert!(last.has_prev && !last.has_next);

        let single = PageWindow::derive(1, 4);
        assert!(!single.should_display());

        let empty = PageWindow::derive(1, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.pages.is_empty());
        assert!(!empty.has_next);
    }
}
