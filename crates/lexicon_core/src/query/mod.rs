//! Entry filter/sort configuration and its SQL compilation.
//!
//! # Responsibility
//! - Model the user-facing browse configuration (filter, sort, view).
//! - Compile one configuration into a single ordered `SELECT` of lexeme ids.
//!
//! # Invariants
//! - Compiled ordering is total: `lexemes.id` always breaks ties.
//! - User text is bound as parameters, never spliced into SQL.

use crate::db::DbError;
use crate::model::lexeme::CategoryId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod compile;
pub mod filter;

pub type QueryResult<T> = Result<T, QueryError>;

/// Query validation and execution errors.
#[derive(Debug)]
pub enum QueryError {
    /// Filter or sort references a category that is not imported.
    UnknownCategory(CategoryId),
    Db(DbError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCategory(id) => write!(f, "query references unknown category {id}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownCategory(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for QueryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
