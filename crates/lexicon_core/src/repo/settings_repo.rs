//! Persisted browse settings.
//!
//! # Invariants
//! - Settings are stored as JSON under fixed keys in the `settings` table.
//! - A missing row yields `BrowseSettings::default()`.
//! - A row that cannot be decoded is reported, not silently reset.
//! - Effective settings only reference categories and views that exist in
//!   the imported dictionary.

use crate::query::filter::{BrowseSettings, SortKey};
use crate::repo::dictionary_repo::{
    DictionaryRepository, RepoError, RepoResult, SqliteDictionaryRepository,
};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

const BROWSE_SETTINGS_KEY: &str = "browse_settings";

/// Repository interface for user preferences.
pub trait SettingsRepository {
    fn load_browse_settings(&self) -> RepoResult<BrowseSettings>;
    fn save_browse_settings(&self, settings: &BrowseSettings) -> RepoResult<()>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load_browse_settings(&self) -> RepoResult<BrowseSettings> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                [BROWSE_SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                RepoError::InvalidData(format!(
                    "invalid JSON in settings.{BROWSE_SETTINGS_KEY}: {err}"
                ))
            }),
            None => Ok(BrowseSettings::default()),
        }
    }

    fn save_browse_settings(&self, settings: &BrowseSettings) -> RepoResult<()> {
        let raw = serde_json::to_string(settings).map_err(|err| {
            RepoError::InvalidData(format!("cannot encode browse settings: {err}"))
        })?;
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![BROWSE_SETTINGS_KEY, raw],
        )?;
        Ok(())
    }
}

/// Loads the settings a browse session should start from.
///
/// Undecodable JSON falls back to defaults. References to categories or a
/// view that a re-import removed are dropped and the result is saved back.
pub fn load_effective_settings(conn: &Connection) -> RepoResult<BrowseSettings> {
    let repo = SqliteSettingsRepository::new(conn);
    let mut settings = match repo.load_browse_settings() {
        Ok(settings) => settings,
        Err(RepoError::InvalidData(message)) => {
            warn!("event=settings_load module=repo status=fallback reason={message}");
            BrowseSettings::default()
        }
        Err(err) => return Err(err),
    };
    if sanitize_browse_settings(conn, &mut settings)? {
        repo.save_browse_settings(&settings)?;
    }
    Ok(settings)
}

/// Drops category filters, a category sort and a view that are not imported.
///
/// Returns `true` when `settings` changed.
pub fn sanitize_browse_settings(
    conn: &Connection,
    settings: &mut BrowseSettings,
) -> RepoResult<bool> {
    let dictionary = SqliteDictionaryRepository::new(conn);
    let known = dictionary
        .list_categories()?
        .into_iter()
        .map(|category| category.id)
        .collect::<HashSet<_>>();
    let mut changed = false;

    let before = settings.filter.category_values.len();
    settings.filter.category_values.retain(|filter| {
        let keep = known.contains(&filter.category_id);
        if !keep {
            warn!(
                "event=settings_sanitize module=repo status=fallback reason=unknown_category category_id={}",
                filter.category_id
            );
        }
        keep
    });
    changed |= settings.filter.category_values.len() != before;

    if let SortKey::Category(category_id) = settings.sort.key {
        if !known.contains(&category_id) {
            warn!(
                "event=settings_sanitize module=repo status=fallback reason=unknown_category category_id={category_id}"
            );
            settings.sort = Default::default();
            changed = true;
        }
    }

    if let Some(view_id) = settings.view_id {
        if dictionary.get_view(view_id)?.is_none() {
            warn!(
                "event=settings_sanitize module=repo status=fallback reason=unknown_view view_id={view_id}"
            );
            settings.view_id = None;
            changed = true;
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::{
        load_effective_settings, sanitize_browse_settings, SettingsRepository,
        SqliteSettingsRepository,
    };
    use crate::db::open_db_in_memory;
    use crate::query::filter::{BrowseSettings, CategoryValueFilter, SortKey};
    use rusqlite::Connection;

    fn seeded() -> Connection {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO categories (id, name, widget, sort_order) VALUES (1, 'Gloss', 'text', 1);
             INSERT INTO dictionary_views (id, name) VALUES (1, 'Glosses');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn sanitize_keeps_known_references() {
        let conn = seeded();
        let mut settings = BrowseSettings::default();
        settings.sort.key = SortKey::Category(1);
        settings.view_id = Some(1);
        settings.filter.category_values = vec![CategoryValueFilter {
            category_id: 1,
            value: "fruit".to_string(),
        }];
        let original = settings.clone();

        assert!(!sanitize_browse_settings(&conn, &mut settings).unwrap());
        assert_eq!(settings, original);
    }

    #[test]
    fn sanitize_drops_unknown_categories_and_view() {
        let conn = seeded();
        let mut settings = BrowseSettings::default();
        settings.sort.key = SortKey::Category(9);
        settings.sort.descending = true;
        settings.view_id = Some(4);
        settings.filter.bookmarked_only = true;
        settings.filter.category_values = vec![
            CategoryValueFilter {
                category_id: 1,
                value: "fruit".to_string(),
            },
            CategoryValueFilter {
                category_id: 7,
                value: "noun".to_string(),
            },
        ];

        assert!(sanitize_browse_settings(&conn, &mut settings).unwrap());
        assert_eq!(settings.sort, Default::default());
        assert_eq!(settings.view_id, None);
        assert_eq!(settings.filter.category_values.len(), 1);
        assert_eq!(settings.filter.category_values[0].category_id, 1);
        assert!(settings.filter.bookmarked_only);
    }

    #[test]
    fn effective_settings_are_saved_back() {
        let conn = seeded();
        let repo = SqliteSettingsRepository::new(&conn);
        let mut stale = BrowseSettings::default();
        stale.view_id = Some(4);
        repo.save_browse_settings(&stale).unwrap();

        let effective = load_effective_settings(&conn).unwrap();
        assert_eq!(effective.view_id, None);
        assert_eq!(repo.load_browse_settings().unwrap().view_id, None);
    }

    #[test]
    fn undecodable_settings_fall_back_to_defaults() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES ('browse_settings', '{', 0);",
            [],
        )
        .unwrap();

        assert_eq!(
            load_effective_settings(&conn).unwrap(),
            BrowseSettings::default()
        );
    }
}
