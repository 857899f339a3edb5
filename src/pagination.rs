//! This modules defines the common functionality for paging data.

/// The config for pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The page to start on and to go back to when the query changes.
    pub default_page: u64,
    /// The number of transactions to request per page.
    pub default_page_size: u64,
    /// The maximum number of pages to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_pages: 5,
        }
    }
}

/// One element of the compact page indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationIndicator {
    /// A page that can be jumped to.
    Page(u64),
    /// The page being shown.
    CurrPage(u64),
    /// A gap of pages that are not listed.
    Ellipsis,
    /// Go to the given (next) page.
    NextButton(u64),
    /// Go to the given (previous) page.
    BackButton(u64),
}

/// Tracks the current page against the server's record count and refuses to
/// navigate outside `[1, total_pages]`.
#[derive(Debug, Clone)]
pub struct PaginationController {
    page: u64,
    page_size: u64,
    total_records: u64,
    default_page: u64,
}

impl PaginationController {
    /// Start on the configured default page with no records.
    pub fn new(config: &PaginationConfig) -> Self {
        Self {
            page: config.default_page,
            page_size: config.default_page_size.max(1),
            total_records: 0,
            default_page: config.default_page,
        }
    }

    /// The current page, starting from 1.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// The number of transactions per page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// The record count from the last fetch.
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Record the server's count from the latest fetch.
    pub fn set_total_records(&mut self, total_records: u64) {
        self.total_records = total_records;
    }

    /// `ceil(total_records / page_size)`.
    pub fn total_pages(&self) -> u64 {
        self.total_records.div_ceil(self.page_size)
    }

    /// Go to `page` and call `on_change` with it.
    ///
    /// Pages outside `[1, total_pages]` are ignored and `on_change` is not
    /// called. Returns whether the page changed.
    pub fn go_to(&mut self, page: u64, on_change: impl FnOnce(u64)) -> bool {
        if page < 1 || page > self.total_pages() {
            tracing::debug!(
                "ignoring navigation to page {page}, there are {} pages",
                self.total_pages()
            );
            return false;
        }

        self.page = page;
        on_change(page);

        true
    }

    /// Whether there is a page before the current one.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Whether there is a page after the current one.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Go back to the default page without notifying anyone, used when the
    /// query changes and the old page number no longer means anything.
    pub fn reset(&mut self) {
        self.page = self.default_page;
    }

    /// Set the page without bounds checks.
    ///
    /// Used when restoring a page from the command line before the record
    /// count is known.
    pub fn set_page_unchecked(&mut self, page: u64) {
        self.page = page.max(1);
    }

    /// The page indicator for the current page, listing at most `max_pages`
    /// page numbers.
    pub fn indicators(&self, max_pages: u64) -> Vec<PaginationIndicator> {
        create_pagination_indicators(self.page, self.total_pages(), max_pages)
    }
}

/// Build the indicator for `curr_page` out of `page_count` pages.
///
/// Up to `max_pages` consecutive pages around the current page are listed,
/// with the first and last page always reachable through an ellipsis.
pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    if page_count == 0 {
        return Vec::new();
    }

    let max_pages = max_pages.max(1);
    let half = max_pages / 2;
    let as_indicator = |page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    };

    let (first, last) = if page_count <= max_pages {
        (1, page_count)
    } else if curr_page <= half {
        (1, max_pages)
    } else if curr_page > page_count - half {
        (page_count - max_pages + 1, page_count)
    } else {
        let first = curr_page - half;
        (first, first + max_pages - 1)
    };

    let mut indicators = Vec::new();

    if curr_page > 1 {
        indicators.push(PaginationIndicator::BackButton(curr_page - 1));
    }

    if first > 1 {
        indicators.push(PaginationIndicator::Page(1));
        if first > 2 {
            indicators.push(PaginationIndicator::Ellipsis);
        }
    }

    indicators.extend((first..=last).map(as_indicator));

    if last < page_count {
        if last < page_count - 1 {
            indicators.push(PaginationIndicator::Ellipsis);
        }
        indicators.push(PaginationIndicator::Page(page_count));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}
