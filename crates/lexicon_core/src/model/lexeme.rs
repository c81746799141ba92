//! Lexeme, category, property and dictionary view records.
//!
//! # Responsibility
//! - Mirror the rows of the imported dictionary tables.
//! - Validate record-level invariants shared by import and repositories.
//!
//! # Invariants
//! - `word` and category `name` are never blank.
//! - `base_id`, when set, differs from `id`.
//! - `WidgetType` round-trips through its lowercase storage label.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LexemeId = i64;
pub type CategoryId = i64;
pub type ViewId = i64;

/// Record-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    BlankWord(LexemeId),
    SelfReferencingBase(LexemeId),
    BlankCategoryName(CategoryId),
    BlankViewName(ViewId),
    UnknownWidget(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankWord(id) => write!(f, "lexeme {id} has a blank word"),
            Self::SelfReferencingBase(id) => {
                write!(f, "lexeme {id} names itself as its base form")
            }
            Self::BlankCategoryName(id) => write!(f, "category {id} has a blank name"),
            Self::BlankViewName(id) => write!(f, "dictionary view {id} has a blank name"),
            Self::UnknownWidget(value) => write!(
                f,
                "unknown widget `{value}`; expected text|chips|link|table"
            ),
        }
    }
}

impl Error for ModelValidationError {}

/// Widget used by the UI to render values of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetType {
    /// Plain text paragraph.
    Text,
    /// Short values rendered as chips (part of speech, gender, ...).
    Chips,
    /// Value refers to another headword.
    Link,
    /// Tabular value, e.g. an inflection table.
    Table,
}

impl WidgetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Chips => "chips",
            Self::Link => "link",
            Self::Table => "table",
        }
    }

    /// Parses a storage/CSV label, case-insensitive.
    pub fn parse(value: &str) -> Result<Self, ModelValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "chips" => Ok(Self::Chips),
            "link" => Ok(Self::Link),
            "table" => Ok(Self::Table),
            _ => Err(ModelValidationError::UnknownWidget(value.to_string())),
        }
    }
}

/// Dictionary headword or full form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexeme {
    pub id: LexemeId,
    pub word: String,
    /// Base form this lexeme is a full form of. `None` for headwords.
    pub base_id: Option<LexemeId>,
}

impl Lexeme {
    pub fn new(id: LexemeId, word: impl Into<String>, base_id: Option<LexemeId>) -> Self {
        Self {
            id,
            word: word.into(),
            base_id,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.word.trim().is_empty() {
            return Err(ModelValidationError::BlankWord(self.id));
        }
        if self.base_id == Some(self.id) {
            return Err(ModelValidationError::SelfReferencingBase(self.id));
        }
        Ok(())
    }
}

/// Typed information field attached to lexemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub widget: WidgetType,
    /// Display order inside an entry; ties break by id.
    pub sort_order: i64,
}

impl Category {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::BlankCategoryName(self.id));
        }
        Ok(())
    }
}

/// One category value of one lexeme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub lexeme_id: LexemeId,
    pub category_id: CategoryId,
    pub value: String,
}

/// Named subset of categories shown in entry detail and previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryView {
    pub id: ViewId,
    pub name: String,
    pub category_ids: Vec<CategoryId>,
}

impl DictionaryView {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::BlankViewName(self.id));
        }
        Ok(())
    }

    pub fn shows(&self, category_id: CategoryId) -> bool {
        self.category_ids.contains(&category_id)
    }
}
