//! Transactional replacement of the stored dictionary.

use crate::import::records::DictionaryData;
use crate::import::ImportResult;
use crate::model::lexeme::LexemeId;
use rusqlite::{params, Connection, TransactionBehavior};

/// Writes `data` over the current dictionary and returns the kept bookmark count.
pub(crate) fn write_dictionary(
    conn: &mut Connection,
    data: &DictionaryData,
    source_label: &str,
) -> ImportResult<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Full forms may precede their base form in lexemes.csv.
    tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;

    let previous_bookmarks = {
        let mut stmt = tx.prepare("SELECT lexeme_id, created_at FROM bookmarks ORDER BY seq ASC;")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, LexemeId>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    tx.execute_batch(
        "DELETE FROM entry_cache;
         DELETE FROM bookmarks;
         DELETE FROM properties;
         DELETE FROM dictionary_view_categories;
         DELETE FROM dictionary_views;
         DELETE FROM lexemes;
         DELETE FROM categories;",
    )?;

    {
        let mut insert_category = tx.prepare(
            "INSERT INTO categories (id, name, widget, sort_order) VALUES (?1, ?2, ?3, ?4);",
        )?;
        for category in &data.categories {
            let category = &category.record;
            insert_category.execute(params![
                category.id,
                category.name.as_str(),
                category.widget.as_str(),
                category.sort_order,
            ])?;
        }

        let mut insert_lexeme =
            tx.prepare("INSERT INTO lexemes (id, word, base_id) VALUES (?1, ?2, ?3);")?;
        for lexeme in &data.lexemes {
            let lexeme = &lexeme.record;
            insert_lexeme.execute(params![lexeme.id, lexeme.word.as_str(), lexeme.base_id])?;
        }

        let mut insert_property = tx.prepare(
            "INSERT INTO properties (lexeme_id, category_id, value) VALUES (?1, ?2, ?3);",
        )?;
        for property in &data.properties {
            let property = &property.record;
            insert_property.execute(params![
                property.lexeme_id,
                property.category_id,
                property.value.as_str(),
            ])?;
        }

        let mut insert_view =
            tx.prepare("INSERT INTO dictionary_views (id, name) VALUES (?1, ?2);")?;
        let mut insert_view_category = tx.prepare(
            "INSERT INTO dictionary_view_categories (view_id, category_id) VALUES (?1, ?2);",
        )?;
        for view in &data.views {
            let view = &view.record;
            insert_view.execute(params![view.id, view.name.as_str()])?;
            for category_id in &view.category_ids {
                insert_view_category.execute(params![view.id, category_id])?;
            }
        }
    }

    let mut bookmarks_kept = 0;
    {
        let mut restore_bookmark = tx.prepare(
            "INSERT INTO bookmarks (lexeme_id, created_at)
             SELECT ?1, ?2
             WHERE EXISTS (SELECT 1 FROM lexemes WHERE id = ?1);",
        )?;
        for (lexeme_id, created_at) in previous_bookmarks {
            bookmarks_kept += restore_bookmark.execute(params![lexeme_id, created_at])?;
        }
    }

    tx.execute(
        "UPDATE cache_state SET generation = generation + 1, total = 0 WHERE id = 1;",
        [],
    )?;
    tx.execute(
        "INSERT INTO import_state (
            id, source, version, imported_at, categories, lexemes, properties, views
         ) VALUES (1, ?1, ?2, (strftime('%s', 'now') * 1000), ?3, ?4, ?5, ?6)
         ON CONFLICT (id) DO UPDATE SET
            source = excluded.source,
            version = excluded.version,
            imported_at = excluded.imported_at,
            categories = excluded.categories,
            lexemes = excluded.lexemes,
            properties = excluded.properties,
            views = excluded.views;",
        params![
            source_label,
            data.version.as_deref(),
            data.categories.len() as i64,
            data.lexemes.len() as i64,
            data.properties.len() as i64,
            data.views.len() as i64,
        ],
    )?;

    tx.commit()?;
    Ok(bookmarks_kept)
}
