//! Display order to stored page mapping
//!
//! Pages can be reordered on screen without renaming their stored
//! annotations. Every store call goes through [`PageOrder::resolve`] so it
//! uses the stored page id, never the display index.

use crate::persistence::StoredPage;

/// Errors building or editing a page order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageOrderError {
    #[error("display index {index} is out of range for {page_count} pages")]
    OutOfRange { index: usize, page_count: usize },
    #[error("stored page {0} appears more than once")]
    Duplicate(u32),
    #[error("stored page {page} is outside 1..={page_count}")]
    UnknownPage { page: u32, page_count: usize },
}

/// Order table: position `i` holds the stored page shown at display index `i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrder {
    pages: Vec<StoredPage>,
}

impl PageOrder {
    /// Display index `i` shows stored page `i + 1`
    pub fn identity(page_count: u32) -> Self {
        Self {
            pages: (1..=page_count).map(StoredPage).collect(),
        }
    }

    /// Build from an explicit table, which must be a permutation of `1..=len`
    pub fn from_stored(pages: Vec<u32>) -> Result<Self, PageOrderError> {
        let page_count = pages.len();
        let mut seen = vec![false; page_count];

        for &page in &pages {
            let slot = (page as usize)
                .checked_sub(1)
                .filter(|&slot| slot < page_count)
                .ok_or(PageOrderError::UnknownPage { page, page_count })?;
            if std::mem::replace(&mut seen[slot], true) {
                return Err(PageOrderError::Duplicate(page));
            }
        }

        Ok(Self {
            pages: pages.into_iter().map(StoredPage).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Stored page for a display index
    pub fn resolve(&self, display_index: usize) -> Result<StoredPage, PageOrderError> {
        self.pages
            .get(display_index)
            .copied()
            .ok_or(PageOrderError::OutOfRange {
                index: display_index,
                page_count: self.pages.len(),
            })
    }

    /// Display index currently showing `page`
    pub fn display_index_of(&self, page: StoredPage) -> Option<usize> {
        self.pages.iter().position(|&p| p == page)
    }

    /// Move the page at display index `from` so it ends up at `to`
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), PageOrderError> {
        let page_count = self.pages.len();
        for index in [from, to] {
            if index >= page_count {
                return Err(PageOrderError::OutOfRange { index, page_count });
            }
        }

        let page = self.pages.remove(from);
        self.pages.insert(to, page);
        Ok(())
    }

    /// Stored pages in display order
    pub fn stored_pages(&self) -> &[StoredPage] {
        &self.pages
    }
}
