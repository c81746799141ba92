//! Bookmark repository contracts and SQLite implementation.
//!
//! # Invariants
//! - At most one bookmark exists per lexeme.
//! - Listing is newest first (`created_at DESC, seq DESC`).
//! - Bookmarking an unknown lexeme is `RepoError::NotFound`.

use crate::model::lexeme::{Lexeme, LexemeId};
use crate::repo::dictionary_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};

/// One bookmarked lexeme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub lexeme: Lexeme,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Repository interface for bookmark operations.
pub trait BookmarkRepository {
    /// Sets bookmark state; returns whether the stored state changed.
    fn set_bookmark(&self, id: LexemeId, bookmarked: bool) -> RepoResult<bool>;
    /// Flips bookmark state and returns the new state.
    fn toggle_bookmark(&self, id: LexemeId) -> RepoResult<bool>;
    fn is_bookmarked(&self, id: LexemeId) -> RepoResult<bool>;
    fn list_bookmarks(&self) -> RepoResult<Vec<Bookmark>>;
    /// Removes every bookmark and returns the removed count.
    fn clear_bookmarks(&self) -> RepoResult<usize>;
}

/// SQLite-backed bookmark repository.
pub struct SqliteBookmarkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookmarkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn ensure_lexeme_exists(&self, id: LexemeId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM lexemes WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(RepoError::NotFound(id))
        }
    }
}

impl BookmarkRepository for SqliteBookmarkRepository<'_> {
    fn set_bookmark(&self, id: LexemeId, bookmarked: bool) -> RepoResult<bool> {
        self.ensure_lexeme_exists(id)?;

        let changed = if bookmarked {
            self.conn.execute(
                "INSERT OR IGNORE INTO bookmarks (lexeme_id) VALUES (?1);",
                [id],
            )?
        } else {
            self.conn
                .execute("DELETE FROM bookmarks WHERE lexeme_id = ?1;", [id])?
        };

        Ok(changed > 0)
    }

    fn toggle_bookmark(&self, id: LexemeId) -> RepoResult<bool> {
        let next = !self.is_bookmarked(id)?;
        self.set_bookmark(id, next)?;
        Ok(next)
    }

    fn is_bookmarked(&self, id: LexemeId) -> RepoResult<bool> {
        self.ensure_lexeme_exists(id)?;
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE lexeme_id = ?1);",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_bookmarks(&self) -> RepoResult<Vec<Bookmark>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.word, l.base_id, b.created_at
             FROM bookmarks b
             INNER JOIN lexemes l ON l.id = b.lexeme_id
             ORDER BY b.created_at DESC, b.seq DESC;",
        )?;
        let bookmarks = stmt
            .query_map([], |row| {
                Ok(Bookmark {
                    lexeme: Lexeme {
                        id: row.get(0)?,
                        word: row.get(1)?,
                        base_id: row.get(2)?,
                    },
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bookmarks)
    }

    fn clear_bookmarks(&self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM bookmarks;", [])?;
        Ok(removed)
    }
}
