//! Category/search filtering and the reveal window used for infinite scrolling
//!
//! Search is two-stage. The raw term follows every keystroke and resets the window
//! at once; the effective term only catches up after the input has been quiet for
//! the debounce interval, and only the effective term drives filtering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::catalog::CatalogSnapshot;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::models::{MediaItem, MediaKind};

/// Case-insensitive substring check without allocation for ASCII input
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.is_ascii() && needle.is_ascii() {
        if needle.len() > haystack.len() {
            return false;
        }
        return haystack
            .as_bytes()
            .windows(needle.len())
            .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()));
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    pub page_size: usize,
    pub reveal_threshold: usize,
    pub debounce: Duration,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            page_size: 50,
            reveal_threshold: 10,
            debounce: Duration::from_millis(500),
        }
    }
}

impl From<&AppConfig> for FilterOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            reveal_threshold: config.reveal_threshold,
            debounce: config.search_debounce(),
        }
    }
}

/// What the render surface needs to restore its controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub selected_category_id: Option<String>,
    pub search_term: String,
    pub reveal_count: usize,
}

pub struct FilterEngine {
    snapshot: Arc<CatalogSnapshot>,
    clock: Arc<dyn Clock>,
    options: FilterOptions,
    selected_category: Option<String>,
    raw_term: String,
    effective_term: String,
    // Time of the last keystroke not yet applied
    pending_since: Option<Instant>,
    // Requested window size; clamped to the filtered length when read
    reveal: usize,
    // Indices into the snapshot, in snapshot order
    filtered: Vec<usize>,
    version: u64,
}

impl FilterEngine {
    pub fn new(snapshot: Arc<CatalogSnapshot>, clock: Arc<dyn Clock>, options: FilterOptions) -> Self {
        let options = FilterOptions {
            page_size: options.page_size.max(1),
            ..options
        };
        let mut engine = Self {
            snapshot,
            clock,
            selected_category: None,
            raw_term: String::new(),
            effective_term: String::new(),
            pending_since: None,
            reveal: options.page_size,
            filtered: Vec::new(),
            version: 0,
            options,
        };
        engine.refilter();
        engine
    }

    pub fn empty(kind: MediaKind, clock: Arc<dyn Clock>, options: FilterOptions) -> Self {
        Self::new(Arc::new(CatalogSnapshot::empty(kind)), clock, options)
    }

    fn reset_window(&mut self) {
        self.reveal = self.options.page_size;
    }

    fn refilter(&mut self) {
        let category = self.selected_category.as_deref();
        let term = self.effective_term.as_str();
        self.filtered = self
            .snapshot
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                category.map_or(true, |c| item.category_id.as_deref() == Some(c))
                    && contains_ignore_case(&item.title, term)
            })
            .map(|(idx, _)| idx)
            .collect();
        self.version += 1;
    }

    /// Swap in a new snapshot. A different kind starts from a clean filter; a refresh
    /// of the same kind keeps category and search.
    pub fn replace_snapshot(&mut self, snapshot: Arc<CatalogSnapshot>) {
        if snapshot.kind() != self.snapshot.kind() {
            self.selected_category = None;
            self.raw_term.clear();
            self.effective_term.clear();
            self.pending_since = None;
        }
        self.snapshot = snapshot;
        self.reset_window();
        self.refilter();
    }

    pub fn set_category(&mut self, category_id: Option<String>) {
        self.reset_window();
        if self.selected_category != category_id {
            self.selected_category = category_id;
            self.refilter();
        }
    }

    /// Record a keystroke. Filtering waits for [`tick`](Self::tick) after the debounce.
    pub fn set_search_term(&mut self, term: &str) {
        self.raw_term = term.to_string();
        self.reset_window();
        self.pending_since = Some(self.clock.now());
    }

    /// Apply the raw term if the input has been quiet long enough.
    /// Returns true when the filtered sequence changed.
    pub fn tick(&mut self) -> bool {
        match self.pending_since {
            Some(since) if self.clock.now().saturating_duration_since(since) >= self.options.debounce => {
                self.apply_search()
            }
            _ => false,
        }
    }

    /// Apply the raw term now, skipping the remaining debounce
    pub fn flush_search(&mut self) -> bool {
        if self.pending_since.is_some() {
            self.apply_search()
        } else {
            false
        }
    }

    fn apply_search(&mut self) -> bool {
        self.pending_since = None;
        if self.effective_term == self.raw_term {
            return false;
        }
        self.effective_term = self.raw_term.clone();
        debug!(term = %self.effective_term, "Applying search");
        self.reset_window();
        self.refilter();
        true
    }

    /// Grow the window by one page. Returns false when already saturated.
    pub fn reveal_more(&mut self) -> bool {
        let total = self.filtered.len();
        if self.reveal >= total {
            return false;
        }
        self.reveal = (self.reveal + self.options.page_size).min(total);
        true
    }

    /// Near-end policy: the render surface reports the last index it shows
    pub fn should_reveal_more(&self, last_shown_index: usize) -> bool {
        let count = self.reveal_count();
        count < self.filtered.len()
            && last_shown_index
                .saturating_add(self.options.reveal_threshold)
                .saturating_add(1)
                >= count
    }

    pub fn reveal_count(&self) -> usize {
        self.reveal.min(self.filtered.len())
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Items in the filtered sequence, in snapshot order
    pub fn filtered(&self) -> impl Iterator<Item = &MediaItem> + '_ {
        let items = self.snapshot.items();
        self.filtered.iter().map(move |&idx| &items[idx])
    }

    /// Prefix of the filtered sequence currently shown
    pub fn visible(&self) -> Vec<&MediaItem> {
        self.filtered().take(self.reveal_count()).collect()
    }

    pub fn state(&self) -> FilterState {
        FilterState {
            selected_category_id: self.selected_category.clone(),
            search_term: self.raw_term.clone(),
            reveal_count: self.reveal_count(),
        }
    }

    pub fn snapshot(&self) -> &Arc<CatalogSnapshot> {
        &self.snapshot
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selected_category.as_deref()
    }

    pub fn raw_term(&self) -> &str {
        &self.raw_term
    }

    pub fn effective_term(&self) -> &str {
        &self.effective_term
    }

    pub fn search_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Bumped every time the filtered sequence is recomputed
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn options(&self) -> FilterOptions {
        self.options
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
