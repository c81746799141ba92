//! Browse configuration types.
//!
//! # Invariants
//! - `EntryFilter::search` is transient input and is never persisted.
//! - Search text stored in an `EntryQuery` is already normalized.

use crate::model::lexeme::{CategoryId, ViewId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default number of entries per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

static WHITESPACE_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// How search text is matched against headwords and property values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Value starts with the text.
    #[default]
    Prefix,
    /// Value contains the text anywhere.
    Contains,
    /// Value equals the text (case-insensitive).
    Exact,
}

/// Requires a lexeme to carry `value` in `category_id` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryValueFilter {
    pub category_id: CategoryId,
    pub value: String,
}

/// Filter half of an entry query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFilter {
    #[serde(skip)]
    pub search: String,
    pub search_mode: SearchMode,
    /// Also match search text against property values.
    pub search_properties: bool,
    pub bookmarked_only: bool,
    /// Hide full forms, keeping headwords only.
    pub base_forms_only: bool,
    /// All filters must match.
    pub category_values: Vec<CategoryValueFilter>,
}

/// Sort key of an entry query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "category_id")]
pub enum SortKey {
    /// Headword, case-insensitive.
    #[default]
    Word,
    WordLength,
    /// Import order.
    Id,
    /// Smallest value of one category; lexemes without it come last.
    Category(CategoryId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrySort {
    pub key: SortKey,
    pub descending: bool,
}

/// Effective filter + sort used to materialize the entry cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    pub filter: EntryFilter,
    pub sort: EntrySort,
}

impl EntryQuery {
    /// Combines persisted settings with the current search input.
    pub fn from_settings(settings: &BrowseSettings, search: &str) -> Self {
        let mut filter = settings.filter.clone();
        filter.search = normalize_search(search);
        Self {
            filter,
            sort: settings.sort,
        }
    }

    /// Returns the category ids this query depends on.
    pub fn referenced_categories(&self) -> Vec<CategoryId> {
        let mut ids = self
            .filter
            .category_values
            .iter()
            .map(|filter| filter.category_id)
            .collect::<Vec<_>>();
        if let SortKey::Category(id) = self.sort.key {
            ids.push(id);
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// User preferences that drive the browse screen; persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseSettings {
    pub filter: EntryFilter,
    pub sort: EntrySort,
    /// Dictionary view used for previews and entry detail.
    pub view_id: Option<ViewId>,
    pub page_size: u32,
}

impl Default for BrowseSettings {
    fn default() -> Self {
        Self {
            filter: EntryFilter::default(),
            sort: EntrySort::default(),
            view_id: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Trims and collapses inner whitespace runs to a single space.
pub fn normalize_search(text: &str) -> String {
    WHITESPACE_RUN_RE.replace_all(text.trim(), " ").into_owned()
}

/// Escapes `LIKE` wildcards for use with `ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{escape_like, normalize_search, BrowseSettings, EntryQuery, SortKey};

    #[test]
    fn normalize_search_collapses_whitespace() {
        assert_eq!(normalize_search("  big \t  red\ndog "), "big red dog");
        assert_eq!(normalize_search("   "), "");
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn search_text_is_not_persisted() {
        let mut settings = BrowseSettings::default();
        settings.filter.search = "transient".to_string();
        settings.filter.bookmarked_only = true;

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("transient"));

        let restored: BrowseSettings = serde_json::from_str(&json).unwrap();
        assert!(restored.filter.bookmarked_only);
        assert!(restored.filter.search.is_empty());
    }

    #[test]
    fn partial_settings_json_falls_back_to_defaults() {
        let restored: BrowseSettings =
            serde_json::from_str(r#"{"sort":{"key":{"kind":"category","category_id":4}}}"#)
                .unwrap();
        assert_eq!(restored.sort.key, SortKey::Category(4));
        assert_eq!(restored.page_size, BrowseSettings::default().page_size);
    }

    #[test]
    fn referenced_categories_are_deduplicated() {
        let mut settings = BrowseSettings::default();
        settings.filter.category_values = vec![
            super::CategoryValueFilter {
                category_id: 2,
                value: "noun".to_string(),
            },
            super::CategoryValueFilter {
                category_id: 2,
                value: "verb".to_string(),
            },
        ];
        settings.sort.key = SortKey::Category(2);
        let query = EntryQuery::from_settings(&settings, " cat ");
        assert_eq!(query.referenced_categories(), vec![2]);
        assert_eq!(query.filter.search, "cat");
    }
}
