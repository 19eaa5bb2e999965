use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use super::debounce::DebounceSlot;

/// A field value as seen by text search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Flag(bool),
    Missing,
}

/// Records that expose named fields to text search.
pub trait Searchable {
    fn field(&self, name: &str) -> FieldValue<'_>;
}

/// Case-insensitive substring match of one field against an already
/// lowercased needle. Numbers match on their decimal representation
/// (`10.0` is "10", `2.5` is "2.5"); flags and missing values never match.
pub fn field_matches(value: FieldValue<'_>, needle: &str) -> bool {
    match value {
        FieldValue::Text(s) => s.to_lowercase().contains(needle),
        FieldValue::Number(n) => n.to_string().contains(needle),
        FieldValue::Flag(_) | FieldValue::Missing => false,
    }
}

/// How an item is tested against the settled search term.
pub struct Matcher<T> {
    label: String,
    test: Box<dyn Fn(&T, &str) -> bool>,
}

impl<T> Matcher<T> {
    /// Arbitrary `(item, lowercased_term) -> bool` test.
    pub fn predicate(f: impl Fn(&T, &str) -> bool + 'static) -> Self {
        Self {
            label: "predicate".to_string(),
            test: Box::new(f),
        }
    }

    pub fn matches(&self, item: &T, needle: &str) -> bool {
        (self.test)(item, needle)
    }
}

impl<T: Searchable + 'static> Matcher<T> {
    /// Match when any of `fields` contains the term.
    pub fn fields(fields: &[&str]) -> Self {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let label = format!("fields({})", fields.join(", "));
        Self {
            label,
            test: Box::new(move |item: &T, needle: &str| {
                fields.iter().any(|f| field_matches(item.field(f), needle))
            }),
        }
    }
}

impl<T> fmt::Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher").field("kind", &self.label).finish()
    }
}

/// True when `term` should not filter at all.
pub fn is_blank(term: &str) -> bool {
    term.trim().is_empty()
}

/// Indices of `items` matching `term`. A blank term keeps everything.
pub fn search_indices<T>(items: &[T], term: &str, matcher: &Matcher<T>) -> Vec<usize> {
    if is_blank(term) {
        return (0..items.len()).collect();
    }
    let needle = term.to_lowercase();
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| matcher.matches(item, &needle).then_some(i))
        .collect()
}

/// Search state whose effective term only follows the raw input once the
/// input has been stable for the configured delay.
#[derive(Debug)]
pub struct DebouncedSearch<T> {
    raw: String,
    settled: String,
    slot: DebounceSlot<String>,
    matcher: Matcher<T>,
}

impl<T> DebouncedSearch<T> {
    pub fn new(matcher: Matcher<T>, delay: Duration) -> Self {
        Self {
            raw: String::new(),
            settled: String::new(),
            slot: DebounceSlot::new(delay),
            matcher,
        }
    }

    pub fn raw_term(&self) -> &str {
        &self.raw
    }

    pub fn settled_term(&self) -> &str {
        &self.settled
    }

    pub fn matcher(&self) -> &Matcher<T> {
        &self.matcher
    }

    /// Raw input has not settled yet.
    pub fn is_searching(&self) -> bool {
        !is_blank(&self.raw) && self.raw != self.settled
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slot.deadline()
    }

    /// Record a new raw term observed at `now`.
    ///
    /// Returns true when the settled term changed immediately, which only
    /// happens when the input was cleared.
    pub fn set_term_at(&mut self, term: &str, now: Instant) -> bool {
        if self.slot.is_disposed() {
            return false;
        }
        self.raw = term.to_string();
        if is_blank(term) {
            self.slot.cancel();
            let changed = !self.settled.is_empty();
            self.settled.clear();
            return changed;
        }
        if self.raw == self.settled {
            self.slot.cancel();
            return false;
        }
        self.slot.schedule(self.raw.clone(), now);
        false
    }

    pub fn set_term(&mut self, term: &str) -> bool {
        self.set_term_at(term, Instant::now())
    }

    /// Settle the pending term if its delay elapsed by `now`.
    /// Returns true when the settled term changed.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.slot.poll(now) {
            Some(term) if term != self.settled => {
                debug!(term = %term, "search term settled");
                self.settled = term;
                true
            }
            _ => false,
        }
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Cancel any pending term. The settled term is frozen from here on.
    pub fn dispose(&mut self) {
        self.slot.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.is_disposed()
    }

    /// Items matching the settled term, in input order.
    pub fn filter<'a>(&self, items: &'a [T]) -> Vec<&'a T> {
        search_indices(items, &self.settled, &self.matcher)
            .into_iter()
            .map(|i| &items[i])
            .collect()
    }
}

impl<T> Drop for DebouncedSearch<T> {
    fn drop(&mut self) {
        self.slot.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        code: Option<&'static str>,
        price: f64,
        active: bool,
    }

    impl Searchable for Row {
        fn field(&self, name: &str) -> FieldValue<'_> {
            match name {
                "name" => FieldValue::Text(self.name),
                "code" => self.code.map_or(FieldValue::Missing, FieldValue::Text),
                "price" => FieldValue::Number(self.price),
                "active" => FieldValue::Flag(self.active),
                _ => FieldValue::Missing,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "Golden Willow", code: Some("GW-100"), price: 120.0, active: true },
            Row { name: "Crackling Palm", code: None, price: 2.5, active: true },
            Row { name: "Blue Peony", code: Some("BP-7"), price: 45.0, active: false },
        ]
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn names(found: &[&Row]) -> Vec<&'static str> {
        found.iter().map(|r| r.name).collect()
    }

    #[test]
    fn numeric_fields_match_on_decimal_text() {
        assert!(field_matches(FieldValue::Number(120.0), "12"));
        assert!(!field_matches(FieldValue::Number(120.0), "120.0"));
        assert!(field_matches(FieldValue::Number(2.5), "2.5"));
        assert!(!field_matches(FieldValue::Flag(true), "true"));
        assert!(!field_matches(FieldValue::Missing, ""));
    }

    #[test]
    fn field_matcher_is_case_insensitive_and_skips_missing() {
        let items = rows();
        let m = Matcher::fields(&["name", "code"]);
        assert_eq!(search_indices(&items, "PEONY", &m), vec![2]);
        assert_eq!(search_indices(&items, "gw-", &m), vec![0]);
        let by_price = Matcher::fields(&["price", "active"]);
        assert_eq!(search_indices(&items, "2.5", &by_price), vec![1]);
        assert!(search_indices(&items, "true", &by_price).is_empty());
    }

    #[test]
    fn predicate_matcher_receives_lowercased_term() {
        let items = rows();
        let m = Matcher::predicate(|r: &Row, term: &str| {
            assert_eq!(term, term.to_lowercase());
            r.active && r.name.to_lowercase().contains(term)
        });
        assert_eq!(search_indices(&items, "L", &m), vec![0, 1]);
    }

    #[test]
    fn only_the_final_term_of_a_burst_settles() {
        let items = rows();
        let t0 = Instant::now();
        let mut s = DebouncedSearch::new(Matcher::fields(&["name"]), ms(300));
        s.set_term_at("p", t0);
        s.set_term_at("pa", t0 + ms(100));
        s.set_term_at("pal", t0 + ms(200));
        assert!(s.is_searching());
        // nothing settled while the burst is in progress
        assert!(!s.poll_at(t0 + ms(450)));
        assert_eq!(s.settled_term(), "");
        assert_eq!(s.filter(&items).len(), 3);

        assert!(s.poll_at(t0 + ms(500)));
        assert_eq!(s.settled_term(), "pal");
        assert!(!s.is_searching());
        assert_eq!(names(&s.filter(&items)), vec!["Crackling Palm"]);
    }

    #[test]
    fn clearing_the_term_applies_without_delay() {
        let items = rows();
        let t0 = Instant::now();
        let mut s = DebouncedSearch::new(Matcher::fields(&["name"]), ms(300));
        s.set_term_at("willow", t0);
        s.poll_at(t0 + ms(300));
        assert_eq!(s.filter(&items).len(), 1);

        s.set_term_at("wi", t0 + ms(400));
        assert!(s.set_term_at("   ", t0 + ms(410)));
        assert!(!s.is_searching());
        assert_eq!(s.next_deadline(), None);
        assert_eq!(s.filter(&items).len(), 3);
    }

    #[test]
    fn typing_back_to_settled_term_cancels_pending() {
        let t0 = Instant::now();
        let mut s: DebouncedSearch<Row> = DebouncedSearch::new(Matcher::fields(&["name"]), ms(300));
        s.set_term_at("blue", t0);
        s.poll_at(t0 + ms(300));
        s.set_term_at("blu", t0 + ms(310));
        s.set_term_at("blue", t0 + ms(320));
        assert_eq!(s.next_deadline(), None);
        assert!(!s.is_searching());
    }

    #[test]
    fn disposed_search_never_settles() {
        let t0 = Instant::now();
        let mut s: DebouncedSearch<Row> = DebouncedSearch::new(Matcher::fields(&["name"]), ms(300));
        s.set_term_at("palm", t0);
        s.dispose();
        assert!(!s.poll_at(t0 + ms(10_000)));
        assert_eq!(s.settled_term(), "");
        assert!(!s.set_term_at("", t0 + ms(10_001)));
        assert!(s.is_disposed());
    }
}
