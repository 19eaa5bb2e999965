use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::CatalogItem;

/// Selector value meaning "do not filter on this field".
pub const ALL: &str = "all";

/// Direction of one sort key. Anything unrecognised parses as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    None,
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" | "up" => SortDirection::Ascending,
            "desc" | "descending" | "down" => SortDirection::Descending,
            _ => SortDirection::None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SortDirection::None => "none",
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }

    /// Orient an ascending comparison. `None` for an unset direction.
    pub fn orient(self, ord: Ordering) -> Option<Ordering> {
        match self {
            SortDirection::None => None,
            SortDirection::Ascending => Some(ord),
            SortDirection::Descending => Some(ord.reverse()),
        }
    }

    pub fn is_set(self) -> bool {
        self != SortDirection::None
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SortDirection {
    fn from(s: &str) -> Self {
        SortDirection::parse(s)
    }
}

/// User-chosen filter and sort parameters for the product list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub search: String,
    pub category: String,
    pub effect: String,
    pub price_sort: SortDirection,
    pub duration_sort: SortDirection,
    pub active_only: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: ALL.to_string(),
            effect: ALL.to_string(),
            price_sort: SortDirection::None,
            duration_sort: SortDirection::None,
            active_only: false,
        }
    }
}

impl FilterState {
    /// Lowercased category to filter on, or None for "all".
    pub fn category_filter(&self) -> Option<String> {
        selector(&self.category)
    }

    /// Lowercased effect to filter on, or None for "all".
    pub fn effect_filter(&self) -> Option<String> {
        selector(&self.effect)
    }

    /// Base-filter test: active flag, category and effect. Search and sort
    /// are separate stages.
    pub fn keeps<T: CatalogItem>(&self, item: &T) -> bool {
        self.keeps_with(item, self.category_filter().as_deref(), self.effect_filter().as_deref())
    }

    pub(crate) fn keeps_with<T: CatalogItem>(
        &self,
        item: &T,
        category: Option<&str>,
        effect: Option<&str>,
    ) -> bool {
        if self.active_only && !item.is_active() {
            return false;
        }
        if let Some(cat) = category {
            if item.category().to_lowercase() != cat {
                return false;
            }
        }
        if let Some(eff) = effect {
            match item.effect() {
                Some(e) if e.to_lowercase() == eff => {}
                _ => return false,
            }
        }
        true
    }

    /// True when no stage would drop or reorder anything.
    pub fn is_identity(&self) -> bool {
        !self.active_only
            && self.category_filter().is_none()
            && self.effect_filter().is_none()
            && self.search.trim().is_empty()
            && !self.price_sort.is_set()
            && !self.duration_sort.is_set()
    }
}

fn selector(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case(ALL) {
        None
    } else {
        Some(v.to_lowercase())
    }
}
