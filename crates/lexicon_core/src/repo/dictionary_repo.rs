//! Dictionary content repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read lexemes, categories, views and resolved entries.
//! - Keep join/ordering rules of the entry detail screen inside core.
//!
//! # Invariants
//! - Entry properties are ordered by `sort_order ASC, category id ASC, property id ASC`.
//! - When a dictionary view is applied, only its categories are returned.

use crate::db::DbError;
use crate::model::entry::{DictionaryEntry, EntryProperty};
use crate::model::lexeme::{
    Category, CategoryId, DictionaryView, Lexeme, LexemeId, ViewId, WidgetType,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for dictionary, bookmark and settings persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(LexemeId),
    UnknownView(ViewId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "lexeme not found: {id}"),
            Self::UnknownView(id) => write!(f, "dictionary view not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted dictionary data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::UnknownView(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for read-only dictionary content.
pub trait DictionaryRepository {
    fn get_lexeme(&self, id: LexemeId) -> RepoResult<Option<Lexeme>>;
    /// Resolves one entry; `view_id` restricts the returned properties.
    fn get_entry(&self, id: LexemeId, view_id: Option<ViewId>)
        -> RepoResult<Option<DictionaryEntry>>;
    /// Case-insensitive exact headword lookup, used to follow link widgets.
    fn find_by_word(&self, word: &str) -> RepoResult<Vec<Lexeme>>;
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    fn list_views(&self) -> RepoResult<Vec<DictionaryView>>;
    fn get_view(&self, id: ViewId) -> RepoResult<Option<DictionaryView>>;
    fn count_lexemes(&self) -> RepoResult<u32>;
}

/// SQLite-backed dictionary repository.
pub struct SqliteDictionaryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDictionaryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DictionaryRepository for SqliteDictionaryRepository<'_> {
    fn get_lexeme(&self, id: LexemeId) -> RepoResult<Option<Lexeme>> {
        let lexeme = self
            .conn
            .query_row(
                "SELECT id, word, base_id FROM lexemes WHERE id = ?1;",
                [id],
                parse_lexeme_row,
            )
            .optional()?;
        Ok(lexeme)
    }

    fn get_entry(
        &self,
        id: LexemeId,
        view_id: Option<ViewId>,
    ) -> RepoResult<Option<DictionaryEntry>> {
        let Some(lexeme) = self.get_lexeme(id)? else {
            return Ok(None);
        };

        let view = match view_id {
            Some(view_id) => Some(
                self.get_view(view_id)?
                    .ok_or(RepoError::UnknownView(view_id))?,
            ),
            None => None,
        };

        let base_form = match lexeme.base_id {
            Some(base_id) => Some(self.get_lexeme(base_id)?.ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "lexeme {} references missing base form {base_id}",
                    lexeme.id
                ))
            })?),
            None => None,
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, word, base_id
             FROM lexemes
             WHERE base_id = ?1
             ORDER BY word COLLATE NOCASE ASC, id ASC;",
        )?;
        let full_forms = stmt
            .query_map([id], parse_lexeme_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT
                c.id AS category_id,
                c.name AS name,
                c.widget AS widget,
                c.sort_order AS sort_order,
                p.value AS value
             FROM properties p
             INNER JOIN categories c ON c.id = p.category_id
             WHERE p.lexeme_id = ?1
             ORDER BY c.sort_order ASC, c.id ASC, p.id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut properties = Vec::new();
        while let Some(row) = rows.next()? {
            let category = Category {
                id: row.get("category_id")?,
                name: row.get("name")?,
                widget: parse_widget(&row.get::<_, String>("widget")?)?,
                sort_order: row.get("sort_order")?,
            };
            if let Some(view) = view.as_ref() {
                if !view.shows(category.id) {
                    continue;
                }
            }
            properties.push(EntryProperty {
                category,
                value: row.get("value")?,
            });
        }

        let is_bookmarked: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE lexeme_id = ?1);",
            [id],
            |row| row.get(0),
        )?;

        Ok(Some(DictionaryEntry {
            lexeme,
            base_form,
            full_forms,
            properties,
            is_bookmarked: is_bookmarked == 1,
        }))
    }

    fn find_by_word(&self, word: &str) -> RepoResult<Vec<Lexeme>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, word, base_id
             FROM lexemes
             WHERE word = ?1 COLLATE NOCASE
             ORDER BY (base_id IS NOT NULL) ASC, id ASC;",
        )?;
        let lexemes = stmt
            .query_map([word.trim()], parse_lexeme_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lexemes)
    }

    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, widget, sort_order
             FROM categories
             ORDER BY sort_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(Category {
                id: row.get("id")?,
                name: row.get("name")?,
                widget: parse_widget(&row.get::<_, String>("widget")?)?,
                sort_order: row.get("sort_order")?,
            });
        }
        Ok(categories)
    }

    fn list_views(&self) -> RepoResult<Vec<DictionaryView>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM dictionary_views ORDER BY id ASC;")?;
        let heads = stmt
            .query_map([], |row| Ok((row.get::<_, ViewId>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut views = Vec::with_capacity(heads.len());
        for (id, name) in heads {
            views.push(DictionaryView {
                id,
                name,
                category_ids: load_view_categories(self.conn, id)?,
            });
        }
        Ok(views)
    }

    fn get_view(&self, id: ViewId) -> RepoResult<Option<DictionaryView>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM dictionary_views WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;

        match name {
            Some(name) => Ok(Some(DictionaryView {
                id,
                name,
                category_ids: load_view_categories(self.conn, id)?,
            })),
            None => Ok(None),
        }
    }

    fn count_lexemes(&self) -> RepoResult<u32> {
        let count: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lexemes;", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Maps `id, word, base_id` columns into a [`Lexeme`].
pub(crate) fn parse_lexeme_row(row: &Row<'_>) -> rusqlite::Result<Lexeme> {
    Ok(Lexeme {
        id: row.get("id")?,
        word: row.get("word")?,
        base_id: row.get("base_id")?,
    })
}

fn parse_widget(value: &str) -> RepoResult<WidgetType> {
    WidgetType::parse(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid widget `{value}` in categories.widget"))
    })
}

fn load_view_categories(conn: &Connection, view_id: ViewId) -> RepoResult<Vec<CategoryId>> {
    let mut stmt = conn.prepare(
        "SELECT vc.category_id
         FROM dictionary_view_categories vc
         INNER JOIN categories c ON c.id = vc.category_id
         WHERE vc.view_id = ?1
         ORDER BY c.sort_order ASC, c.id ASC;",
    )?;
    let ids = stmt
        .query_map(params![view_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
