//! Position cache materialization.
//!
//! # Invariants
//! - A rebuild is one `IMMEDIATE` transaction: delete all rows, reinsert in
//!   compiled order, bump the generation.
//! - A failed rebuild leaves the previous rows and generation in place.

use crate::db::DbError;
use crate::model::lexeme::LexemeId;
use crate::query::compile::{compile, validate_query};
use crate::query::filter::EntryQuery;
use crate::query::QueryError;
use log::{error, info};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug)]
pub enum CacheError {
    Query(QueryError),
    Db(DbError),
    /// The query matched more entries than a position can address.
    TooManyEntries(usize),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::TooManyEntries(count) => {
                write!(f, "query matched {count} entries, more than the cache can hold")
            }
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::TooManyEntries(_) => None,
        }
    }
}

impl From<QueryError> for CacheError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Generation and size of the materialized entry order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheState {
    pub generation: u64,
    pub total: u32,
}

/// Re-materializes `entry_cache` for `query`.
///
/// # Side effects
/// - Replaces every cache row and bumps the generation.
/// - Emits `cache_rebuild` logging events with duration and size.
pub fn rebuild_cache(conn: &mut Connection, query: &EntryQuery) -> CacheResult<CacheState> {
    let started_at = Instant::now();
    info!(
        "event=cache_rebuild module=browse status=start search_len={} sort={:?} bookmarked_only={} category_filters={}",
        query.filter.search.chars().count(),
        query.sort.key,
        query.filter.bookmarked_only,
        query.filter.category_values.len()
    );

    match rebuild_in_tx(conn, query) {
        Ok(state) => {
            info!(
                "event=cache_rebuild module=browse status=ok duration_ms={} generation={} total={}",
                started_at.elapsed().as_millis(),
                state.generation,
                state.total
            );
            Ok(state)
        }
        Err(err) => {
            error!(
                "event=cache_rebuild module=browse status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn rebuild_in_tx(conn: &mut Connection, query: &EntryQuery) -> CacheResult<CacheState> {
    let compiled = compile(query);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    validate_query(&tx, query)?;

    let ids = {
        let mut stmt = tx.prepare(&compiled.sql)?;
        let ids = stmt
            .query_map(params_from_iter(compiled.params.iter()), |row| {
                row.get::<_, LexemeId>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };
    let total = cache_total(ids.len())?;

    tx.execute("DELETE FROM entry_cache;", [])?;
    {
        let mut insert =
            tx.prepare("INSERT INTO entry_cache (position, lexeme_id) VALUES (?1, ?2);")?;
        for (position, lexeme_id) in ids.iter().enumerate() {
            insert.execute(params![position as i64, lexeme_id])?;
        }
    }

    tx.execute(
        "UPDATE cache_state SET generation = generation + 1, total = ?1 WHERE id = 1;",
        [total],
    )?;
    let state = read_state(&tx)?;
    tx.commit()?;
    Ok(state)
}

/// Reads the current cache generation and size.
pub fn cache_state(conn: &Connection) -> CacheResult<CacheState> {
    read_state(conn)
}

/// Finds the cache position of one lexeme, if it is part of the current order.
pub fn position_of(conn: &Connection, lexeme_id: LexemeId) -> CacheResult<Option<u32>> {
    let position = conn
        .query_row(
            "SELECT position FROM entry_cache WHERE lexeme_id = ?1;",
            [lexeme_id],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    Ok(position)
}

fn cache_total(count: usize) -> CacheResult<u32> {
    u32::try_from(count).map_err(|_| CacheError::TooManyEntries(count))
}

fn read_state(conn: &Connection) -> CacheResult<CacheState> {
    let state = conn.query_row(
        "SELECT generation, total FROM cache_state WHERE id = 1;",
        [],
        |row| {
            Ok(CacheState {
                generation: row.get::<_, i64>(0)? as u64,
                total: row.get(1)?,
            })
        },
    )?;
    Ok(state)
}
