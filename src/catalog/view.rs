use std::time::{Duration, Instant};

use super::filters::{FilterState, SortDirection};
use super::live::{ChangeEvent, Keyed, LiveSnapshot};
use super::search::{is_blank, DebouncedSearch, Matcher};
use super::{base_filter_indices, collect, default_matcher, search_stage, sort_indices};
use super::{CatalogItem, DerivedResult};

/// How many times each stage was recomputed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageRuns {
    pub base: usize,
    pub search: usize,
    pub sort: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct BaseKey {
    generation: u64,
    category: Option<String>,
    effect: Option<String>,
    active_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct SearchKey {
    base_rev: u64,
    term: String,
}

#[derive(Debug, Clone, PartialEq)]
struct SortKey {
    search_rev: u64,
    price: SortDirection,
    duration: SortDirection,
}

#[derive(Debug)]
struct Stage<K> {
    key: K,
    rev: u64,
    indices: Vec<usize>,
}

/// Product list state: the snapshot, the user's filter choices and the
/// debounced search, with each pipeline stage cached against its own inputs.
///
/// `filter_state().search` is the raw input; the search stage only ever sees
/// the settled term. Call `poll` (or `poll_at`) from the event loop so the
/// pending term can settle.
#[derive(Debug)]
pub struct CatalogView<T> {
    snapshot: LiveSnapshot<T>,
    state: FilterState,
    search: DebouncedSearch<T>,
    base: Option<Stage<BaseKey>>,
    searched: Option<Stage<SearchKey>>,
    sorted: Option<Stage<SortKey>>,
    rev: u64,
    runs: StageRuns,
}

impl<T: CatalogItem + Keyed + 'static> CatalogView<T> {
    pub fn new(items: Vec<T>, delay: Duration) -> Self {
        Self::with_matcher(items, default_matcher(), delay)
    }
}

impl<T: CatalogItem + Keyed> CatalogView<T> {
    pub fn with_matcher(items: Vec<T>, matcher: Matcher<T>, delay: Duration) -> Self {
        Self {
            snapshot: LiveSnapshot::new(items),
            state: FilterState::default(),
            search: DebouncedSearch::new(matcher, delay),
            base: None,
            searched: None,
            sorted: None,
            rev: 0,
            runs: StageRuns::default(),
        }
    }

    pub fn items(&self) -> &[T] {
        self.snapshot.items()
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.state
    }

    pub fn settled_term(&self) -> &str {
        self.search.settled_term()
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_searching()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.search.next_deadline()
    }

    pub fn stage_runs(&self) -> StageRuns {
        self.runs
    }

    pub fn set_category(&mut self, category: &str) {
        self.state.category = category.to_string();
    }

    pub fn set_effect(&mut self, effect: &str) {
        self.state.effect = effect.to_string();
    }

    pub fn set_price_sort(&mut self, dir: SortDirection) {
        self.state.price_sort = dir;
    }

    pub fn set_duration_sort(&mut self, dir: SortDirection) {
        self.state.duration_sort = dir;
    }

    pub fn set_active_only(&mut self, active_only: bool) {
        self.state.active_only = active_only;
    }

    /// Feed a raw search term observed at `now`.
    pub fn set_search_at(&mut self, term: &str, now: Instant) -> bool {
        if self.search.is_disposed() {
            return false;
        }
        self.state.search = term.to_string();
        self.search.set_term_at(term, now)
    }

    pub fn set_search(&mut self, term: &str) -> bool {
        self.set_search_at(term, Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        self.search.poll_at(now)
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Back to the default filters, keeping the active-only toggle.
    pub fn reset_filters(&mut self) {
        let active_only = self.state.active_only;
        self.state = FilterState {
            active_only,
            ..FilterState::default()
        };
        self.search.set_term("");
    }

    /// Apply one pushed change from the item source.
    pub fn apply(&mut self, event: ChangeEvent<T>) -> bool {
        self.snapshot.apply(event)
    }

    /// Swap in a freshly fetched snapshot.
    pub fn replace_items(&mut self, items: Vec<T>) {
        self.snapshot.replace(items);
    }

    /// Cancel the pending search term. Later input is ignored.
    pub fn dispose(&mut self) {
        self.search.dispose();
    }

    /// Derive the current list, recomputing only stages whose inputs moved.
    pub fn result(&mut self) -> DerivedResult<T>
    where
        T: Clone,
    {
        self.refresh();
        let order = self
            .sorted
            .as_ref()
            .map(|s| s.indices.as_slice())
            .unwrap_or(&[]);
        collect(self.snapshot.items(), order)
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.rev
    }

    fn refresh(&mut self) {
        let base_key = BaseKey {
            generation: self.snapshot.generation(),
            category: self.state.category_filter(),
            effect: self.state.effect_filter(),
            active_only: self.state.active_only,
        };
        if self.base.as_ref().map_or(true, |s| s.key != base_key) {
            let indices = base_filter_indices(self.snapshot.items(), &self.state);
            let rev = self.next_rev();
            self.runs.base += 1;
            self.base = Some(Stage { key: base_key, rev, indices });
        }

        let (base_rev, base_indices) = match self.base {
            Some(ref s) => (s.rev, s.indices.as_slice()),
            None => return,
        };
        let settled = self.search.settled_term();
        let search_key = SearchKey {
            base_rev,
            term: if is_blank(settled) { String::new() } else { settled.to_string() },
        };
        if self.searched.as_ref().map_or(true, |s| s.key != search_key) {
            let indices = search_stage(
                self.snapshot.items(),
                base_indices,
                &search_key.term,
                self.search.matcher(),
            );
            self.rev += 1;
            self.runs.search += 1;
            self.searched = Some(Stage {
                key: search_key,
                rev: self.rev,
                indices,
            });
        }

        let (search_rev, searched) = match self.searched {
            Some(ref s) => (s.rev, s.indices.clone()),
            None => return,
        };
        let sort_key = SortKey {
            search_rev,
            price: self.state.price_sort,
            duration: self.state.duration_sort,
        };
        if self.sorted.as_ref().map_or(true, |s| s.key != sort_key) {
            let mut indices = searched;
            sort_indices(self.snapshot.items(), &mut indices, sort_key.price, sort_key.duration);
            let rev = self.next_rev();
            self.runs.sort += 1;
            self.sorted = Some(Stage { key: sort_key, rev, indices });
        }
    }
}
