//! Compiles an [`EntryQuery`] into an ordered lexeme id `SELECT`.
//!
//! # Invariants
//! - The statement selects exactly one column, `id`, in final display order.
//! - Blank search text adds no predicate.
//! - Category sorts place lexemes without a value last in both directions.

use crate::query::filter::{escape_like, EntryQuery, SearchMode, SortKey};
use crate::query::{QueryError, QueryResult};
use rusqlite::types::Value;
use rusqlite::Connection;

/// SQL text plus positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compiles `query` into SQL. Does not touch the database.
pub fn compile(query: &EntryQuery) -> CompiledQuery {
    let mut sql = String::from("SELECT l.id AS id FROM lexemes l");
    let mut params: Vec<Value> = Vec::new();

    // Joined first so its placeholder precedes the WHERE placeholders.
    if let SortKey::Category(category_id) = query.sort.key {
        sql.push_str(
            " LEFT JOIN (
                SELECT lexeme_id, MIN(value COLLATE NOCASE) AS sort_value
                FROM properties
                WHERE category_id = ?
                GROUP BY lexeme_id
            ) s ON s.lexeme_id = l.id",
        );
        params.push(Value::Integer(category_id));
    }

    sql.push_str(" WHERE 1 = 1");
    let filter = &query.filter;

    if filter.base_forms_only {
        sql.push_str(" AND l.base_id IS NULL");
    }

    if filter.bookmarked_only {
        sql.push_str(" AND EXISTS (SELECT 1 FROM bookmarks b WHERE b.lexeme_id = l.id)");
    }

    for category_filter in &filter.category_values {
        sql.push_str(
            " AND EXISTS (
                SELECT 1
                FROM properties p
                WHERE p.lexeme_id = l.id
                  AND p.category_id = ?
                  AND p.value = ? COLLATE NOCASE
            )",
        );
        params.push(Value::Integer(category_filter.category_id));
        params.push(Value::Text(category_filter.value.trim().to_string()));
    }

    if !filter.search.is_empty() {
        let (operator, pattern) = match filter.search_mode {
            SearchMode::Exact => ("= ? COLLATE NOCASE", filter.search.clone()),
            SearchMode::Prefix => (
                "LIKE ? ESCAPE '\\'",
                format!("{}%", escape_like(&filter.search)),
            ),
            SearchMode::Contains => (
                "LIKE ? ESCAPE '\\'",
                format!("%{}%", escape_like(&filter.search)),
            ),
        };

        sql.push_str(&format!(" AND (l.word {operator}"));
        params.push(Value::Text(pattern.clone()));
        if filter.search_properties {
            sql.push_str(&format!(
                " OR EXISTS (
                    SELECT 1
                    FROM properties sp
                    WHERE sp.lexeme_id = l.id
                      AND sp.value {operator}
                )"
            ));
            params.push(Value::Text(pattern));
        }
        sql.push(')');
    }

    let direction = if query.sort.descending { "DESC" } else { "ASC" };
    let order_by = match query.sort.key {
        SortKey::Word => format!("l.word COLLATE NOCASE {direction}, l.id ASC"),
        SortKey::WordLength => format!(
            "length(l.word) {direction}, l.word COLLATE NOCASE ASC, l.id ASC"
        ),
        SortKey::Id => format!("l.id {direction}"),
        SortKey::Category(_) => format!(
            "(s.sort_value IS NULL) ASC, s.sort_value COLLATE NOCASE {direction}, l.word COLLATE NOCASE ASC, l.id ASC"
        ),
    };
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_by);

    CompiledQuery { sql, params }
}

/// Checks that every category referenced by `query` exists.
pub fn validate_query(conn: &Connection, query: &EntryQuery) -> QueryResult<()> {
    for category_id in query.referenced_categories() {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1);",
            [category_id],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(QueryError::UnknownCategory(category_id));
        }
    }
    Ok(())
}
