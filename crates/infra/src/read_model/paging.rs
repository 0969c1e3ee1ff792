//! Fixed-size pagination over sorted result sets.

use serde::Serialize;

/// Catalog pages are a fixed 20 items.
pub const PAGE_SIZE: usize = 20;

/// 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page(u32);

impl Page {
    /// Page numbers below 1 are clamped to the first page.
    pub fn new(number: u32) -> Self {
        Self(number.max(1))
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl Default for Page {
    fn default() -> Self {
        Self(1)
    }
}

/// One page of a larger result set, with the counts needed for page links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: usize,
}

/// Slice a full (already filtered and sorted) result set into one page.
///
/// `total_pages = ceil(total_count / PAGE_SIZE)`. Requesting a page past the
/// end yields an empty item set, not an error.
pub fn paginate<T>(items: Vec<T>, page: Page) -> Paged<T> {
    let total_count = items.len();
    let total_pages = total_count.div_ceil(PAGE_SIZE) as u32;
    let offset = (page.number() as usize - 1) * PAGE_SIZE;

    let items = if offset >= total_count {
        Vec::new()
    } else {
        items
            .into_iter()
            .skip(offset)
            .take(PAGE_SIZE)
            .collect()
    };

    Paged {
        items,
        page: page.number(),
        total_pages,
        total_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_has_zero_pages() {
        let paged = paginate(Vec::<u32>::new(), Page::new(1));
        assert!(paged.items.is_empty());
        assert_eq!(paged.total_pages, 0);
        assert_eq!(paged.total_count, 0);
    }

    #[test]
    fn page_count_is_ceiling_division() {
        assert_eq!(paginate((0..20).collect::<Vec<_>>(), Page::new(1)).total_pages, 1);
        assert_eq!(paginate((0..21).collect::<Vec<_>>(), Page::new(1)).total_pages, 2);
        assert_eq!(paginate((0..40).collect::<Vec<_>>(), Page::new(1)).total_pages, 2);
        assert_eq!(paginate((0..41).collect::<Vec<_>>(), Page::new(1)).total_pages, 3);
    }

    #[test]
    fn pages_slice_in_order() {
        let paged = paginate((0..45).collect::<Vec<_>>(), Page::new(2));
        assert_eq!(paged.items.len(), PAGE_SIZE);
        assert_eq!(paged.items[0], 20);
        assert_eq!(paged.items[19], 39);

        let last = paginate((0..45).collect::<Vec<_>>(), Page::new(3));
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[0], 40);
    }

    #[test]
    fn page_past_the_end_is_empty_not_an_error() {
        let paged = paginate((0..5).collect::<Vec<_>>(), Page::new(9));
        assert!(paged.items.is_empty());
        assert_eq!(paged.total_pages, 1);
        assert_eq!(paged.total_count, 5);
    }

    #[test]
    fn page_zero_is_clamped_to_first_page() {
        let paged = paginate((0..5).collect::<Vec<_>>(), Page::new(0));
        assert_eq!(paged.page, 1);
        assert_eq!(paged.items.len(), 5);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: page count is exactly ceil(total / PAGE_SIZE) and
            /// every in-range page is non-empty while out-of-range pages are
            /// empty.
            #[test]
            fn ceiling_and_emptiness(total in 0usize..200, page in 1u32..20) {
                let items: Vec<usize> = (0..total).collect();
                let paged = paginate(items, Page::new(page));

                prop_assert_eq!(paged.total_pages as usize, total.div_ceil(PAGE_SIZE));
                if (page as usize) <= total.div_ceil(PAGE_SIZE) && total > 0 {
                    prop_assert!(!paged.items.is_empty());
                } else {
                    prop_assert!(paged.items.is_empty());
                }
            }

            /// Property: concatenating all pages reproduces the input.
            #[test]
            fn pages_partition_the_input(total in 0usize..120) {
                let items: Vec<usize> = (0..total).collect();
                let total_pages = total.div_ceil(PAGE_SIZE);

                let mut reassembled = Vec::new();
                for page in 1..=total_pages.max(1) {
                    reassembled.extend(paginate(items.clone(), Page::new(page as u32)).items);
                }
                prop_assert_eq!(reassembled, items);
            }
        }
    }
}
