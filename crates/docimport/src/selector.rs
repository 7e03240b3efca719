//! Selection of files that still need importing

use crate::metastore::{MetadataStore, RecordFilter, Result};
use docimport_common::types::{FileRecord, Flag, DELETED_COLUMN, IMPORTED_COLUMN};
use std::collections::VecDeque;
use tracing::{debug, info};

pub const DEFAULT_PAGE_SIZE: usize = 500;

/// `imported` unset and `__deleted` unset.
pub fn pending_filter() -> RecordFilter {
    RecordFilter::new()
        .flag(IMPORTED_COLUMN, Flag::Unset)
        .flag(DELETED_COLUMN, Flag::Unset)
}

/// Lazy, paged walk over pending files in store order.
///
/// Pages are fetched by position cursor, so rows marked imported while the
/// walk is in progress are neither repeated nor cause later rows to be
/// skipped. Each call to [`pending_files`] starts again from the first row.
pub struct PendingFiles<'a> {
    store: &'a dyn MetadataStore,
    filter: RecordFilter,
    cursor: Option<u64>,
    page: VecDeque<FileRecord>,
    page_size: usize,
    exhausted: bool,
}

impl<'a> PendingFiles<'a> {
    pub fn with_page_size(store: &'a dyn MetadataStore, page_size: usize) -> Self {
        Self {
            store,
            filter: pending_filter(),
            cursor: None,
            page: VecDeque::new(),
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let rows = self.store.find(&self.filter, self.cursor, self.page_size)?;
        debug!(after = ?self.cursor, rows = rows.len(), "Fetched pending page");

        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.cursor = Some(last.position);
        }
        self.page.extend(rows);
        Ok(())
    }
}

impl Iterator for PendingFiles<'_> {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.page.pop_front().map(Ok)
    }
}

pub fn pending_files(store: &dyn MetadataStore) -> PendingFiles<'_> {
    info!("Listing unimported files");
    PendingFiles::with_page_size(store, DEFAULT_PAGE_SIZE)
}
