//! Page selection strings such as `"1,3-5"`.

use std::fmt;

/// A page selection that could not be parsed or does not fit the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRangeError {
    /// A part is not a number or a `start-end` pair.
    InvalidNumber(String),
    /// Page 0 was requested; pages start at 1.
    PageZero,
    /// A page past the end of the document was requested.
    PastEnd { page: usize, page_count: usize },
    /// `start` is greater than `end`.
    Reversed { start: usize, end: usize },
    /// The selection names no page and the document has none to fall back on.
    Empty,
}

impl fmt::Display for PageRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRangeError::InvalidNumber(part) => write!(f, "invalid page number: '{part}'"),
            PageRangeError::PageZero => write!(f, "page 0 is invalid (pages start at 1)"),
            PageRangeError::PastEnd { page, page_count } => {
                write!(f, "page {page} exceeds document page count ({page_count})")
            }
            PageRangeError::Reversed { start, end } => {
                write!(f, "page range {start}-{end} is reversed")
            }
            PageRangeError::Empty => write!(f, "no pages selected and the document has none"),
        }
    }
}

impl std::error::Error for PageRangeError {}

/// Parse a 1-based page selection into sorted, deduplicated 0-based page
/// indices.
///
/// Parts are separated by commas; each is a page number or an inclusive
/// `start-end` range. Whitespace around numbers is ignored. A selection
/// with no parts at all selects the first page.
pub fn parse_page_range(input: &str, page_count: usize) -> Result<Vec<usize>, PageRangeError> {
    let mut pages = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (page_number(start, page_count)?, page_number(end, page_count)?),
            None => {
                let page = page_number(part, page_count)?;
                (page, page)
            }
        };
        if start > end {
            return Err(PageRangeError::Reversed { start, end });
        }
        pages.extend((start..=end).map(|p| p - 1));
    }
    if pages.is_empty() {
        return match page_count {
            0 => Err(PageRangeError::Empty),
            _ => Ok(vec![0]),
        };
    }
    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

fn page_number(text: &str, page_count: usize) -> Result<usize, PageRangeError> {
    let text = text.trim();
    let page: usize = text
        .parse()
        .map_err(|_| PageRangeError::InvalidNumber(text.to_string()))?;
    if page == 0 {
        return Err(PageRangeError::PageZero);
    }
    if page > page_count {
        return Err(PageRangeError::PastEnd { page, page_count });
    }
    Ok(page)
}
