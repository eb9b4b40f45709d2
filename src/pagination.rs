use serde::{Serialize, Serializer};
use std::fmt;

/// Maximum number of entries in the page selector
pub const VISIBLE_SLOTS: usize = 7;

/// One entry of the page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Number(usize),
    Ellipsis,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageToken::Number(page) => write!(f, "{page}"),
            PageToken::Ellipsis => f.write_str("..."),
        }
    }
}

impl Serialize for PageToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageToken::Number(page) => serializer.serialize_u64(*page as u64),
            PageToken::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

fn numbers(start: usize, end: usize) -> impl Iterator<Item = PageToken> {
    (start..=end).map(PageToken::Number)
}

/// Page selector entries for `current_page` (1-based) out of `total_pages`.
///
/// Short selections list every page. Longer ones keep the first and last
/// page and a window around the current page, with ellipses for the gaps.
pub fn page_window(current_page: usize, total_pages: usize) -> Vec<PageToken> {
    let half = VISIBLE_SLOTS.div_ceil(2);

    if total_pages <= VISIBLE_SLOTS {
        return numbers(1, total_pages).collect();
    }

    let start_of_end = total_pages - half;
    let mut window = Vec::with_capacity(VISIBLE_SLOTS);

    if current_page <= half {
        window.extend(numbers(1, half + 1));
        window.extend([PageToken::Ellipsis, PageToken::Number(total_pages)]);
    } else if current_page > start_of_end {
        window.extend([PageToken::Number(1), PageToken::Ellipsis]);
        window.extend(numbers(start_of_end, total_pages));
    } else {
        window.extend([PageToken::Number(1), PageToken::Ellipsis]);
        window.extend(numbers(current_page - 1, current_page + 1));
        window.extend([PageToken::Ellipsis, PageToken::Number(total_pages)]);
    }

    window
}

/// Current position in a paginated dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    current_page: usize,
    total_pages: usize,
}

impl PaginationState {
    /// Starts at `page`, clamped into the valid range
    pub fn new(page: usize, total_pages: usize) -> Self {
        Self {
            current_page: page.clamp(1, total_pages.max(1)),
            total_pages,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn contains(&self, page: usize) -> bool {
        (1..=self.total_pages).contains(&page)
    }

    /// Moves to `page`; returns false and stays put if it does not exist
    pub fn go_to(&mut self, page: usize) -> bool {
        if !self.contains(page) {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn window(&self) -> Vec<PageToken> {
        page_window(self.current_page, self.total_pages)
    }
}
