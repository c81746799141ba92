//! Incremental paging over the position cache.
//!
//! # Responsibility
//! - Serve `[start, end)` windows of `entry_cache` joined with lexeme rows.
//! - Detect that the cache was rebuilt underneath a running list.
//!
//! # Invariants
//! - Keys are cache positions; `next_key`/`prev_key` are `None` at the ends.
//! - `items_before + data.len() + items_after == total` for every page.
//! - A source never returns rows from a generation other than its own.

use crate::browse::cache::{CacheError, CacheState};
use crate::db::DbError;
use crate::model::entry::EntrySummary;
use crate::model::lexeme::{CategoryId, Lexeme, ViewId};
use crate::repo::dictionary_repo::{DictionaryRepository, RepoError, SqliteDictionaryRepository};
use log::debug;
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type PagingResult<T> = Result<T, PagingError>;

#[derive(Debug)]
pub enum PagingError {
    Repo(RepoError),
    Cache(CacheError),
    Db(DbError),
}

impl Display for PagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PagingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Cache(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<RepoError> for PagingError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CacheError> for PagingError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<rusqlite::Error> for PagingError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Direction of one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Initial load or reload around `key` (defaults to position 0).
    Refresh,
    /// Window starting at `key`.
    Append,
    /// Window ending right before `key`.
    Prepend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadParams {
    pub key: Option<u32>,
    pub load_size: u32,
    pub kind: LoadKind,
}

impl LoadParams {
    pub fn refresh(key: Option<u32>, load_size: u32) -> Self {
        Self {
            key,
            load_size,
            kind: LoadKind::Refresh,
        }
    }

    pub fn append(key: u32, load_size: u32) -> Self {
        Self {
            key: Some(key),
            load_size,
            kind: LoadKind::Append,
        }
    }

    pub fn prepend(key: u32, load_size: u32) -> Self {
        Self {
            key: Some(key),
            load_size,
            kind: LoadKind::Prepend,
        }
    }
}

/// One loaded window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub data: Vec<EntrySummary>,
    /// Key for a `Prepend` load, `None` at the start of the list.
    pub prev_key: Option<u32>,
    /// Key for an `Append` load, `None` at the end of the list.
    pub next_key: Option<u32>,
    pub items_before: u32,
    pub items_after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Page(Page),
    /// The cache was rebuilt; discard this source and create a new one.
    Invalid,
}

/// Paging source bound to one cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPagingSource {
    generation: u64,
    view_id: Option<ViewId>,
    preview_category: Option<CategoryId>,
}

impl EntryPagingSource {
    /// Creates a source for `generation`.
    ///
    /// Previews show the first category of `view_id`, or the first category
    /// overall when no view is active.
    pub fn new(conn: &Connection, generation: u64, view_id: Option<ViewId>) -> PagingResult<Self> {
        let repo = SqliteDictionaryRepository::new(conn);
        let preview_category = match view_id {
            Some(view_id) => repo
                .get_view(view_id)?
                .ok_or(RepoError::UnknownView(view_id))?
                .category_ids
                .first()
                .copied(),
            None => repo.list_categories()?.first().map(|category| category.id),
        };

        Ok(Self {
            generation,
            view_id,
            preview_category,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn view_id(&self) -> Option<ViewId> {
        self.view_id
    }

    /// Loads one window of the cache.
    pub fn load(&self, conn: &Connection, params: LoadParams) -> PagingResult<LoadResult> {
        let started_at = Instant::now();
        let tx = conn.unchecked_transaction()?;
        let state = crate::browse::cache::cache_state(&tx)?;
        if state.generation != self.generation {
            debug!(
                "event=page_load module=browse status=invalid bound_generation={} current_generation={}",
                self.generation, state.generation
            );
            return Ok(LoadResult::Invalid);
        }

        let (start, end) = window(state, params);
        let data = self.read_window(&tx, start, end)?;
        tx.commit()?;

        if data.len() != (end - start) as usize {
            debug!(
                "event=page_load module=browse status=invalid expected_rows={} actual_rows={}",
                end - start,
                data.len()
            );
            return Ok(LoadResult::Invalid);
        }

        debug!(
            "event=page_load module=browse status=ok duration_ms={} start={} rows={} total={}",
            started_at.elapsed().as_millis(),
            start,
            data.len(),
            state.total
        );

        Ok(LoadResult::Page(Page {
            data,
            prev_key: (start > 0).then_some(start),
            next_key: (end < state.total).then_some(end),
            items_before: start,
            items_after: state.total - end,
        }))
    }

    fn read_window(
        &self,
        conn: &Connection,
        start: u32,
        end: u32,
    ) -> PagingResult<Vec<EntrySummary>> {
        let mut stmt = conn.prepare_cached(
            "SELECT
                c.position AS position,
                l.id AS id,
                l.word AS word,
                l.base_id AS base_id,
                EXISTS (SELECT 1 FROM bookmarks b WHERE b.lexeme_id = l.id) AS is_bookmarked,
                (
                    SELECT group_concat(p.value, ', ')
                    FROM properties p
                    WHERE p.lexeme_id = l.id
                      AND p.category_id = ?3
                ) AS preview
             FROM entry_cache c
             INNER JOIN lexemes l ON l.id = c.lexeme_id
             WHERE c.position >= ?1
               AND c.position < ?2
             ORDER BY c.position ASC;",
        )?;
        let rows = stmt
            .query_map(params![start, end, self.preview_category], |row| {
                Ok(EntrySummary {
                    position: row.get("position")?,
                    lexeme: Lexeme {
                        id: row.get("id")?,
                        word: row.get("word")?,
                        base_id: row.get("base_id")?,
                    },
                    preview: row.get::<_, Option<String>>("preview")?.unwrap_or_default(),
                    is_bookmarked: row.get::<_, i64>("is_bookmarked")? == 1,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Key to restart a list around `anchor_position` after invalidation.
pub fn refresh_key(anchor_position: Option<u32>, page_size: u32) -> Option<u32> {
    anchor_position.map(|anchor| anchor.saturating_sub(page_size / 2))
}

fn window(state: CacheState, params: LoadParams) -> (u32, u32) {
    let load_size = params.load_size.max(1);
    let key = params.key.unwrap_or(0).min(state.total);
    match params.kind {
        LoadKind::Refresh | LoadKind::Append => {
            (key, key.saturating_add(load_size).min(state.total))
        }
        LoadKind::Prepend => (key.saturating_sub(load_size), key),
    }
}
