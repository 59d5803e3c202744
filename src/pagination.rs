use tracing::trace;

use crate::table::PageMeta;

/// Client-side pagination state. `page` and `page_size` are proposals
/// sent with the next fetch; everything is overwritten wholesale by
/// the server-reported meta of the response, which is authoritative
/// even when it disagrees with the requested page.
///
/// `request` does not clamp: keeping a proposed page inside
/// `[1, total_pages]` is the caller's job (the UI refuses "prev" at
/// page 1 and "next" at the last page).
#[derive(Debug, Clone)]
pub struct PaginationState {
    page: u32,
    page_size: u32,
    total_records: u64,
    total_pages: u32,
}

impl PaginationState {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            total_records: 0,
            total_pages: 1,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn can_prev(&self) -> bool {
        self.page > 1
    }

    pub fn can_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Propose a page for the next fetch. Unclamped on purpose.
    pub fn request(&mut self, page: u32) {
        trace!("Page proposal {} -> {}", self.page, page);
        self.page = page;
    }

    /// Overwrite from a fetch response.
    pub fn apply(&mut self, meta: &PageMeta) {
        let expected = expected_total_pages(meta.total_records, meta.page_size);
        if meta.total_pages != expected {
            trace!(
                "Server reported {} pages, {} expected for {} records",
                meta.total_pages, expected, meta.total_records
            );
        }
        self.page = meta.page;
        self.page_size = meta.page_size;
        self.total_records = meta.total_records;
        self.total_pages = meta.total_pages;
    }

    /// Reset to the first page of a freshly opened file, keeping the
    /// configured page size.
    pub fn reset(&mut self) {
        self.page = 1;
        self.total_records = 0;
        self.total_pages = 1;
    }
}

/// The page count a well-formed server response must report:
/// `max(1, ceil(total_records / page_size))`, so an empty file still
/// has one (empty) page.
pub fn expected_total_pages(total_records: u64, page_size: u32) -> u32 {
    let pages = total_records.div_ceil(page_size.max(1) as u64);
    pages.max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_meta_is_authoritative() {
        let mut state = PaginationState::new(10);
        state.request(99);
        assert_eq!(state.page(), 99);

        // Server corrected the out-of-range proposal.
        state.apply(&PageMeta {
            page: 5,
            page_size: 10,
            total_records: 42,
            total_pages: 5,
        });
        assert_eq!(state.page(), 5);
        assert_eq!(state.total_pages(), 5);
        assert_eq!(state.total_records(), 42);
    }

    #[test]
    fn edges_disable_navigation() {
        let mut state = PaginationState::new(10);
        assert!(!state.can_prev());
        assert!(!state.can_next());

        state.apply(&PageMeta {
            page: 1,
            page_size: 10,
            total_records: 25,
            total_pages: 3,
        });
        assert!(!state.can_prev());
        assert!(state.can_next());

        state.apply(&PageMeta {
            page: 3,
            page_size: 10,
            total_records: 25,
            total_pages: 3,
        });
        assert!(state.can_prev());
        assert!(!state.can_next());
    }

    #[test]
    fn total_pages_formula() {
        assert_eq!(expected_total_pages(0, 10), 1);
        assert_eq!(expected_total_pages(1, 10), 1);
        assert_eq!(expected_total_pages(10, 10), 1);
        assert_eq!(expected_total_pages(11, 10), 2);
        assert_eq!(expected_total_pages(25, 10), 3);
        assert_eq!(expected_total_pages(100, 7), 15);
    }

    #[test]
    fn fixtures_satisfy_total_pages_formula() {
        let fixtures = [
            PageMeta {
                page: 1,
                page_size: 10,
                total_records: 0,
                total_pages: 1,
            },
            PageMeta {
                page: 2,
                page_size: 10,
                total_records: 25,
                total_pages: 3,
            },
            PageMeta {
                page: 15,
                page_size: 7,
                total_records: 100,
                total_pages: 15,
            },
        ];
        for meta in &fixtures {
            assert_eq!(
                meta.total_pages,
                expected_total_pages(meta.total_records, meta.page_size),
                "fixture {meta:?}"
            );
            assert!(meta.page >= 1 && meta.page <= meta.total_pages);
        }
    }
}
