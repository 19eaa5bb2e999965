pub mod debounce;
pub mod filters;
pub mod live;
pub mod search;
pub mod view;

use serde::Serialize;
use std::cmp::Ordering;

use crate::db::models::{NewProduct, Product};
use filters::{FilterState, SortDirection};
use live::Keyed;
use search::{FieldValue, Matcher, Searchable};

/// Fields the product list search looks at.
pub const SEARCH_FIELDS: [&str; 3] = ["name", "code", "manufacturer"];

/// What the filter/sort pipeline needs to read from a record.
pub trait CatalogItem: Searchable {
    fn category(&self) -> &str;
    fn effect(&self) -> Option<&str>;
    fn price(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn is_active(&self) -> bool;
}

/// Ordered output of the pipeline plus counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedResult<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub filtered_count: usize,
}

impl<T> DerivedResult<T> {
    /// Keep at most `limit` items; `filtered_count` follows the kept items.
    pub fn truncate(&mut self, limit: usize) {
        self.items.truncate(limit);
        self.filtered_count = self.items.len();
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            filtered_count: 0,
        }
    }
}

/// Default matcher for catalog records: name, code and manufacturer.
pub fn default_matcher<T: CatalogItem + 'static>() -> Matcher<T> {
    Matcher::fields(&SEARCH_FIELDS)
}

/// Stage 1: indices of items passing the active/category/effect filter.
pub fn base_filter_indices<T: CatalogItem>(items: &[T], state: &FilterState) -> Vec<usize> {
    let category = state.category_filter();
    let effect = state.effect_filter();
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            state
                .keeps_with(item, category.as_deref(), effect.as_deref())
                .then_some(i)
        })
        .collect()
}

/// Stage 3: stable sort by price, then a second stable sort by duration.
///
/// The duration pass runs over the price-sorted order, so when both keys are
/// set duration decides and price only breaks duration ties. Missing
/// durations count as 0.
pub fn sort_indices<T: CatalogItem>(
    items: &[T],
    indices: &mut [usize],
    price: SortDirection,
    duration: SortDirection,
) {
    if price.is_set() {
        indices.sort_by(|&a, &b| {
            price
                .orient(compare_f64(items[a].price(), items[b].price()))
                .unwrap_or(Ordering::Equal)
        });
    }
    if duration.is_set() {
        indices.sort_by(|&a, &b| {
            let da = items[a].duration().unwrap_or(0.0);
            let db = items[b].duration().unwrap_or(0.0);
            duration
                .orient(compare_f64(da, db))
                .unwrap_or(Ordering::Equal)
        });
    }
}

/// Total order over prices and durations: NaN ranks after every number and
/// all NaNs tie, so the stable passes keep their relative order.
fn compare_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(&b),
        (true, true) => Ordering::Equal,
        (nan_a, _) => nan_a.cmp(&false),
    }
}

/// Run the whole pipeline once, treating `state.search` as already settled.
pub fn derive_with<T: CatalogItem + Clone>(
    items: &[T],
    state: &FilterState,
    matcher: &Matcher<T>,
) -> DerivedResult<T> {
    let base = base_filter_indices(items, state);
    let searched = search_stage(items, &base, &state.search, matcher);
    let mut order = searched;
    sort_indices(items, &mut order, state.price_sort, state.duration_sort);
    collect(items, &order)
}

/// [`derive_with`] using the default name/code/manufacturer matcher.
pub fn derive<T: CatalogItem + Clone + 'static>(items: &[T], state: &FilterState) -> DerivedResult<T> {
    derive_with(items, state, &default_matcher())
}

/// Stage 2 over a subset of indices.
pub(crate) fn search_stage<T>(
    items: &[T],
    subset: &[usize],
    term: &str,
    matcher: &Matcher<T>,
) -> Vec<usize> {
    if search::is_blank(term) {
        return subset.to_vec();
    }
    let needle = term.to_lowercase();
    subset
        .iter()
        .copied()
        .filter(|&i| matcher.matches(&items[i], &needle))
        .collect()
}

pub(crate) fn collect<T: Clone>(items: &[T], order: &[usize]) -> DerivedResult<T> {
    let out: Vec<T> = order.iter().map(|&i| items[i].clone()).collect();
    DerivedResult {
        filtered_count: out.len(),
        total_count: items.len(),
        items: out,
    }
}

/// Distinct category names in first-seen order, compared case-insensitively.
pub fn categories<T: CatalogItem>(items: &[T]) -> Vec<String> {
    distinct(items.iter().map(|p| p.category()))
}

/// Distinct effect tags in first-seen order, compared case-insensitively.
pub fn effects<T: CatalogItem>(items: &[T]) -> Vec<String> {
    distinct(items.iter().filter_map(|p| p.effect()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for v in values {
        let v = v.trim();
        if !v.is_empty() && seen.insert(v.to_lowercase()) {
            out.push(v.to_string());
        }
    }
    out
}

impl Searchable for Product {
    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => FieldValue::Text(&self.id),
            "name" => FieldValue::Text(&self.name),
            "code" => opt_text(&self.code),
            "manufacturer" => opt_text(&self.manufacturer),
            "category" => FieldValue::Text(&self.category),
            "effect" => opt_text(&self.effect),
            "description" => FieldValue::Text(&self.description),
            "price" => FieldValue::Number(self.price),
            "duration" => self
                .duration_seconds
                .map_or(FieldValue::Missing, FieldValue::Number),
            "active" => FieldValue::Flag(self.active),
            _ => FieldValue::Missing,
        }
    }
}

fn opt_text(v: &Option<String>) -> FieldValue<'_> {
    v.as_deref().map_or(FieldValue::Missing, FieldValue::Text)
}

impl CatalogItem for Product {
    fn category(&self) -> &str {
        &self.category
    }

    fn effect(&self) -> Option<&str> {
        self.effect.as_deref()
    }

    fn price(&self) -> f64 {
        self.price
    }

    fn duration(&self) -> Option<f64> {
        self.duration_seconds
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Keyed for Product {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for NewProduct {
    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
        category: String,
        effect: Option<String>,
        price: f64,
        duration: Option<f64>,
        active: bool,
    }

    impl Searchable for Item {
        fn field(&self, name: &str) -> FieldValue<'_> {
            match name {
                "name" => FieldValue::Text(&self.name),
                _ => FieldValue::Missing,
            }
        }
    }

    impl CatalogItem for Item {
        fn category(&self) -> &str {
            &self.category
        }
        fn effect(&self) -> Option<&str> {
            self.effect.as_deref()
        }
        fn price(&self) -> f64 {
            self.price
        }
        fn duration(&self) -> Option<f64> {
            self.duration
        }
        fn is_active(&self) -> bool {
            self.active
        }
    }

    fn item(name: &str, price: f64, duration: Option<f64>) -> Item {
        Item {
            name: name.to_string(),
            category: "Tortas".to_string(),
            effect: Some("Crackle".to_string()),
            price,
            duration,
            active: true,
        }
    }

    fn pairs(r: &DerivedResult<Item>) -> Vec<(f64, f64)> {
        r.items
            .iter()
            .map(|i| (i.price, i.duration.unwrap_or(0.0)))
            .collect()
    }

    fn names(r: &DerivedResult<Item>) -> Vec<&str> {
        r.items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn duration_sort_dominates_price_sort() {
        let items = vec![
            item("a", 10.0, Some(5.0)),
            item("b", 5.0, Some(5.0)),
            item("c", 20.0, Some(1.0)),
        ];
        let state = FilterState {
            price_sort: SortDirection::Ascending,
            duration_sort: SortDirection::Ascending,
            ..FilterState::default()
        };
        let r = derive(&items, &state);
        assert_eq!(pairs(&r), vec![(20.0, 1.0), (5.0, 5.0), (10.0, 5.0)]);
    }

    #[test]
    fn price_descending_alone() {
        let items = vec![
            item("a", 10.0, None),
            item("b", 5.0, None),
            item("c", 20.0, None),
        ];
        let state = FilterState {
            price_sort: SortDirection::Descending,
            ..FilterState::default()
        };
        assert_eq!(names(&derive(&items, &state)), vec!["c", "a", "b"]);
    }

    #[test]
    fn missing_duration_sorts_as_zero() {
        let items = vec![
            item("long", 1.0, Some(40.0)),
            item("unknown", 1.0, None),
            item("short", 1.0, Some(3.0)),
        ];
        let state = FilterState {
            duration_sort: SortDirection::Ascending,
            ..FilterState::default()
        };
        assert_eq!(names(&derive(&items, &state)), vec!["unknown", "short", "long"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let items = vec![
            item("first", 7.0, Some(2.0)),
            item("second", 7.0, Some(2.0)),
            item("third", 7.0, Some(2.0)),
        ];
        let state = FilterState {
            price_sort: SortDirection::Descending,
            duration_sort: SortDirection::Descending,
            ..FilterState::default()
        };
        assert_eq!(names(&derive(&items, &state)), vec!["first", "second", "third"]);
    }

    #[test]
    fn category_and_effect_are_case_insensitive() {
        let mut other = item("rocket", 3.0, None);
        other.category = "Cohetes".to_string();
        let mut plain = item("no effect", 3.0, None);
        plain.effect = None;
        let items = vec![item("torta", 3.0, None), other, plain];

        let state = FilterState {
            category: "tortas".to_string(),
            ..FilterState::default()
        };
        assert_eq!(names(&derive(&items, &state)), vec!["torta", "no effect"]);

        let state = FilterState {
            effect: "CRACKLE".to_string(),
            ..FilterState::default()
        };
        // items without an effect fail any specific effect selector
        assert_eq!(names(&derive(&items, &state)), vec!["torta", "rocket"]);
    }

    #[test]
    fn active_only_excludes_inactive_regardless_of_other_filters() {
        let mut retired = item("retired", 1.0, None);
        retired.active = false;
        let items = vec![item("live", 1.0, None), retired];
        let state = FilterState {
            active_only: true,
            search: "retired".to_string(),
            ..FilterState::default()
        };
        let r = derive(&items, &state);
        assert!(r.items.is_empty());
        assert_eq!(r.total_count, 2);
        assert_eq!(r.filtered_count, 0);
    }

    #[test]
    fn blank_search_keeps_base_filtered_order() {
        let items = vec![item("z", 3.0, None), item("a", 1.0, None), item("m", 2.0, None)];
        let state = FilterState {
            search: "  ".to_string(),
            ..FilterState::default()
        };
        let r = derive(&items, &state);
        assert_eq!(names(&r), vec!["z", "a", "m"]);
        assert_eq!(r.filtered_count, 3);
    }

    #[test]
    fn nan_prices_sort_last_without_breaking_order() {
        let items: Vec<Item> = (0..60)
            .map(|i| {
                let price = if i % 5 == 0 { f64::NAN } else { ((i * 37) % 23) as f64 };
                item(&format!("p{i}"), price, Some(((i * 11) % 7) as f64))
            })
            .collect();
        let state = FilterState {
            price_sort: SortDirection::Ascending,
            ..FilterState::default()
        };
        let r = derive(&items, &state);
        assert_eq!(r.filtered_count, 60);

        let prices: Vec<f64> = r.items.iter().map(|i| i.price).collect();
        let first_nan = prices.iter().position(|p| p.is_nan()).unwrap();
        assert_eq!(first_nan, 48);
        assert!(prices[first_nan..].iter().all(|p| p.is_nan()));
        assert!(prices[..first_nan].windows(2).all(|w| w[0] <= w[1]));
        // NaN ties keep input order
        let nan_names: Vec<&str> = r.items[first_nan..].iter().map(|i| i.name.as_str()).collect();
        assert_eq!(nan_names[..3], ["p0", "p5", "p10"]);

        let both = FilterState {
            price_sort: SortDirection::Descending,
            duration_sort: SortDirection::Ascending,
            ..FilterState::default()
        };
        let r = derive(&items, &both);
        assert_eq!(r.items.len(), 60);
        assert!(r
            .items
            .windows(2)
            .all(|w| w[0].duration.unwrap_or(0.0) <= w[1].duration.unwrap_or(0.0)));
    }

    #[test]
    fn truncate_keeps_counts_consistent() {
        let items = vec![item("a", 1.0, None), item("b", 2.0, None), item("c", 3.0, None)];
        let mut r = derive(&items, &FilterState::default());
        r.truncate(2);
        assert_eq!(names(&r), vec!["a", "b"]);
        assert_eq!(r.filtered_count, 2);
        assert_eq!(r.total_count, 3);
    }

    #[test]
    fn empty_input_gives_zero_counts() {
        let items: Vec<Item> = Vec::new();
        let r = derive(&items, &FilterState::default());
        assert_eq!(r, DerivedResult::empty());
    }

    #[test]
    fn deriving_twice_is_identical() {
        let items = vec![
            item("Golden Willow", 12.0, Some(30.0)),
            item("Silver Palm", 9.0, Some(30.0)),
            item("Willow Crown", 15.0, None),
        ];
        let state = FilterState {
            search: "WILLOW".to_string(),
            price_sort: SortDirection::Ascending,
            duration_sort: SortDirection::Descending,
            ..FilterState::default()
        };
        let first = derive(&items, &state);
        let second = derive(&items, &state);
        assert_eq!(first, second);
        assert_eq!(names(&first), vec!["Golden Willow", "Willow Crown"]);
    }

    #[test]
    fn distinct_categories_ignore_case() {
        let mut b = item("b", 1.0, None);
        b.category = "TORTAS".to_string();
        let mut c = item("c", 1.0, None);
        c.category = "Candles".to_string();
        c.effect = None;
        let items = vec![item("a", 1.0, None), b, c];
        assert_eq!(categories(&items), vec!["Tortas", "Candles"]);
        assert_eq!(effects(&items), vec!["Crackle"]);
    }
}
