//! # Page Index Cache
//!
//! ## Purpose
//! Maps article numbers to the page they first appear on in paginated
//! sources, scanning incrementally so repeated lookups against the same
//! source never re-read pages that were already examined.
//!
//! ## Input/Output Specification
//! - **Input**: A [`PageSource`] and the article numbers a caller needs
//! - **Output**: The best-known `article number -> page` mapping for those
//!   numbers; 1-based page numbers
//! - **State**: One entry per (source identity, modification fingerprint)
//!
//! ## Key Features
//! - Forward-only resumable scan: `scanned_pages` never decreases
//! - First occurrence wins; continuation headers on later pages are ignored
//! - Early stop once every requested number is mapped, leaving the entry
//!   resumable for future requests
//! - Fingerprint change makes the old entry unreachable, so edited sources
//!   are treated as new
//!
//! ## Usage
//! ```rust,ignore
//! let cache = PageIndexCache::new()?;
//! let key = PageCacheKey::for_file(Path::new("кодекс.pdf"))?;
//! let pages = cache.ensure_pages(&key, &source, &["5", "9"])?;
//! ```

use crate::errors::{PipelineError, Result};
use crate::parser::text::StructurePatterns;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// A text source addressed by zero-based page index.
pub trait PageSource {
    fn page_count(&self) -> usize;
    fn page_text(&self, index: usize) -> Result<String>;
}

/// Identity of one cached source: where it came from plus a fingerprint of
/// its content generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCacheKey {
    pub source: String,
    pub fingerprint: u128,
}

impl PageCacheKey {
    pub fn new(source: impl Into<String>, fingerprint: u128) -> Self {
        Self {
            source: source.into(),
            fingerprint,
        }
    }

    /// Key a file by its path and modification time in milliseconds.
    pub fn for_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let fingerprint = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Ok(Self {
            source: path.display().to_string(),
            fingerprint,
        })
    }
}

/// Scan state for one source.
#[derive(Debug, Clone, Default)]
pub struct PageIndexEntry {
    /// Article number to the 1-based page it first appears on.
    pub page_map: HashMap<String, u32>,
    /// Pages already examined; the next scan starts here.
    pub scanned_pages: usize,
    /// Source page count, recorded on first contact.
    pub total_pages: Option<usize>,
    /// Whether every page has been scanned.
    pub complete: bool,
}

/// Process-lifetime cache of page indexes, one entry per source key.
///
/// The entry map sits behind a single mutex; the scan loop holds the lock
/// while reading pages, which serializes writers per the single-writer
/// discipline the cache assumes.
pub struct PageIndexCache {
    patterns: StructurePatterns,
    entries: Mutex<HashMap<PageCacheKey, PageIndexEntry>>,
}

impl PageIndexCache {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: StructurePatterns::new()?,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Copy of the current entry for `key`, if any.
    pub fn snapshot(&self, key: &PageCacheKey) -> Option<PageIndexEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Return pages for the needed article numbers, scanning forward only
    /// as far as necessary.
    ///
    /// Order of checks per the caching contract: cached hits first, then
    /// the completed-scan short-circuit, then an incremental scan that
    /// stops as soon as every requested number is mapped. A page read
    /// failure surfaces as a recoverable [`PipelineError::PageScan`] and
    /// leaves the entry positioned to resume at the failed page.
    pub fn ensure_pages<S: PageSource>(
        &self,
        key: &PageCacheKey,
        source: &S,
        needed: &[&str],
    ) -> Result<HashMap<String, u32>> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_default();

        let total = source.page_count();
        if entry.total_pages.is_none() {
            entry.total_pages = Some(total);
        }

        let missing = |entry: &PageIndexEntry| {
            needed
                .iter()
                .any(|number| !entry.page_map.contains_key(*number))
        };

        if !entry.complete && missing(entry) {
            tracing::debug!(
                "Resuming page scan of {} at page {}/{}",
                key.source,
                entry.scanned_pages + 1,
                total
            );
            while entry.scanned_pages < total {
                if !missing(entry) {
                    break;
                }
                let index = entry.scanned_pages;
                let text = source.page_text(index).map_err(|e| PipelineError::PageScan {
                    file: key.source.clone(),
                    details: format!("page {}: {e}", index + 1),
                })?;
                for number in self.patterns.page_header_numbers(&text) {
                    entry.page_map.entry(number).or_insert(index as u32 + 1);
                }
                entry.scanned_pages = index + 1;
            }
            if entry.scanned_pages >= total {
                entry.complete = true;
                tracing::debug!(
                    "Page scan of {} complete: {} articles over {} pages",
                    key.source,
                    entry.page_map.len(),
                    total
                );
            }
        }

        Ok(needed
            .iter()
            .filter_map(|number| {
                entry
                    .page_map
                    .get(*number)
                    .map(|page| ((*number).to_string(), *page))
            })
            .collect())
    }

    /// Single-number convenience over [`ensure_pages`](Self::ensure_pages).
    pub fn find_article_page<S: PageSource>(
        &self,
        key: &PageCacheKey,
        source: &S,
        number: &str,
    ) -> Result<Option<u32>> {
        let found = self.ensure_pages(key, source, &[number])?;
        Ok(found.get(number).copied())
    }
}
