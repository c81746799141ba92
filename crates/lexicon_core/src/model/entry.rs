//! Read models for entry detail and paged entry rows.

use crate::model::lexeme::{Category, Lexeme};
use serde::{Deserialize, Serialize};

/// One property value paired with its category metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryProperty {
    pub category: Category,
    pub value: String,
}

/// Fully resolved dictionary entry for the detail screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub lexeme: Lexeme,
    /// Set when `lexeme` is a full form of another headword.
    pub base_form: Option<Lexeme>,
    /// Lexemes whose base form is `lexeme`, ordered by word.
    pub full_forms: Vec<Lexeme>,
    /// Ordered by category `sort_order`, then category id, then insertion.
    pub properties: Vec<EntryProperty>,
    pub is_bookmarked: bool,
}

/// One row of a paged entry list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// 0-based position inside the current entry cache.
    pub position: u32,
    pub lexeme: Lexeme,
    /// Short text shown under the headword; empty when nothing applies.
    pub preview: String,
    pub is_bookmarked: bool,
}
