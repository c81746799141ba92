//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose import, browse, entry detail and bookmark use-cases to Dart.
//! - Keep one process-wide connection and rebuild the entry cache only when
//!   the effective query changes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported in response envelopes with a human message.

use lexicon_core::db::open_db;
use lexicon_core::{
    core_version as core_version_inner, import_dictionary, init_logging as init_logging_inner,
    load_effective_settings, ping as ping_inner, rebuild_cache, BookmarkRepository,
    BrowseSettings, DictionaryEntry, DictionaryRepository, EntryPagingSource, EntryQuery,
    EntrySummary, ImportSource, LexemeId, LoadParams, LoadResult, Page,
    SqliteBookmarkRepository, SqliteDictionaryRepository,
};
use log::warn;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

const BROWSE_DEFAULT_LIMIT: u32 = 50;
const BROWSE_LIMIT_MAX: u32 = 200;
const DB_FILE_NAME: &str = "lexicon.sqlite3";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static SESSION: Mutex<Option<Session>> = Mutex::new(None);

struct Session {
    conn: Connection,
    /// Query the entry cache currently reflects, when known.
    applied: Option<EntryQuery>,
    source: Option<EntryPagingSource>,
}

impl Session {
    fn invalidate(&mut self) {
        self.applied = None;
        self.source = None;
    }
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Result of one dictionary import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResponse {
    pub ok: bool,
    /// Imported lexeme count, zero on failure.
    pub lexemes: u32,
    pub version: Option<String>,
    pub message: String,
}

/// One row of the browse list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseItem {
    pub position: u32,
    pub lexeme_id: i64,
    pub word: String,
    pub preview: String,
    pub is_bookmarked: bool,
}

/// Browse page envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowsePageResponse {
    pub items: Vec<BrowseItem>,
    /// Size of the whole filtered list.
    pub total: u32,
    /// Offset of the following page, `None` at the end of the list.
    pub next_offset: Option<u32>,
    /// Effective applied page limit.
    pub applied_limit: u32,
    pub message: String,
}

/// One property row of an entry detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDetailProperty {
    pub category: String,
    /// Widget label (`text|chips|link|table`).
    pub widget: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDetail {
    pub lexeme_id: i64,
    pub word: String,
    pub base_form: Option<String>,
    pub full_forms: Vec<String>,
    pub properties: Vec<EntryDetailProperty>,
    pub is_bookmarked: bool,
}

/// Entry detail envelope; `entry` is `None` when not found or on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDetailResponse {
    pub ok: bool,
    pub entry: Option<EntryDetail>,
    pub message: String,
}

/// Bookmark toggle envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkResponse {
    pub ok: bool,
    /// State after the toggle.
    pub bookmarked: bool,
    pub message: String,
}

/// Imports a bundled dictionary directory or ZIP archive.
///
/// # FFI contract
/// - Sync call, DB-backed execution; may take seconds on large sources.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn import_bundled(path: String) -> ImportResponse {
    let source = ImportSource::from_path(path.trim());
    let result = with_session(|session| {
        let report = import_dictionary(&mut session.conn, &source).map_err(|err| err.to_string());
        // Imports clear the entry cache even when the caller ignores the result.
        session.invalidate();
        let report = report?;
        let lexemes = u32::try_from(report.lexemes)
            .map_err(|_| format!("lexeme count {} does not fit in u32", report.lexemes))?;
        Ok((report, lexemes))
    });

    match result {
        Ok((report, lexemes)) => ImportResponse {
            ok: true,
            lexemes,
            message: format!("Imported {lexemes} lexeme(s)."),
            version: report.version,
        },
        Err(err) => ImportResponse {
            ok: false,
            lexemes: 0,
            version: None,
            message: format!("import_bundled failed: {err}"),
        },
    }
}

/// Loads one page of the browse list for `search` under persisted settings.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Rebuilds the entry cache only when the effective query changed.
/// - Never panics; returns deterministic envelope with applied limit.
#[flutter_rust_bridge::frb(sync)]
pub fn browse_page(search: String, offset: u32, limit: Option<u32>) -> BrowsePageResponse {
    let applied_limit = normalize_browse_limit(limit);
    let result = with_session(|session| {
        let settings = load_settings(&session.conn);
        let query = EntryQuery::from_settings(&settings, &search);
        let params = LoadParams::refresh(Some(offset), applied_limit);

        // A second attempt covers a cache rebuilt by another connection.
        for _ in 0..2 {
            let source = current_source(session, &query, &settings)?;
            match source
                .load(&session.conn, params)
                .map_err(|err| err.to_string())?
            {
                LoadResult::Page(page) => return Ok(page),
                LoadResult::Invalid => session.invalidate(),
            }
        }
        Err("entry cache changed during load".to_string())
    });

    match result.and_then(|page| to_browse_response(page, applied_limit)) {
        Ok(response) => response,
        Err(err) => BrowsePageResponse {
            items: Vec::new(),
            total: 0,
            next_offset: None,
            applied_limit,
            message: format!("browse_page failed: {err}"),
        },
    }
}

/// Resolves one entry with the persisted dictionary view.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn entry_detail(lexeme_id: i64) -> EntryDetailResponse {
    let result = with_session(|session| {
        let view_id = load_settings(&session.conn).view_id;
        SqliteDictionaryRepository::new(&session.conn)
            .get_entry(lexeme_id, view_id)
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(Some(entry)) => EntryDetailResponse {
            ok: true,
            entry: Some(to_entry_detail(entry)),
            message: String::new(),
        },
        Ok(None) => EntryDetailResponse {
            ok: true,
            entry: None,
            message: format!("Entry {lexeme_id} not found."),
        },
        Err(err) => EntryDetailResponse {
            ok: false,
            entry: None,
            message: format!("entry_detail failed: {err}"),
        },
    }
}

/// Flips the bookmark of one lexeme.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - The next `browse_page` rebuilds when the list only shows bookmarks.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn toggle_bookmark(lexeme_id: i64) -> BookmarkResponse {
    let result = with_session(|session| {
        let bookmarked = SqliteBookmarkRepository::new(&session.conn)
            .toggle_bookmark(lexeme_id)
            .map_err(|err| err.to_string())?;
        if session
            .applied
            .as_ref()
            .is_some_and(|query| query.filter.bookmarked_only)
        {
            session.invalidate();
        }
        Ok(bookmarked)
    });

    match result {
        Ok(bookmarked) => BookmarkResponse {
            ok: true,
            bookmarked,
            message: if bookmarked {
                "Bookmarked.".to_string()
            } else {
                "Bookmark removed.".to_string()
            },
        },
        Err(err) => BookmarkResponse {
            ok: false,
            bookmarked: false,
            message: format!("toggle_bookmark failed: {err}"),
        },
    }
}

/// Looks up the id of a headword, for deep links from the shell.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Returns `None` when the word is unknown or on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn lookup_word(word: String) -> Option<i64> {
    match find_id(&word) {
        Ok(id) => id,
        Err(err) => {
            warn!("event=lookup_word module=ffi status=error error={err}");
            None
        }
    }
}

fn normalize_browse_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => BROWSE_DEFAULT_LIMIT,
        Some(value) if value > BROWSE_LIMIT_MAX => BROWSE_LIMIT_MAX,
        Some(value) => value,
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("LEXICON_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn find_id(word: &str) -> Result<Option<LexemeId>, String> {
    with_session(|session| {
        SqliteDictionaryRepository::new(&session.conn)
            .find_by_word(word)
            .map(|lexemes| lexemes.first().map(|lexeme| lexeme.id))
            .map_err(|err| err.to_string())
    })
}

fn with_session<T>(f: impl FnOnce(&mut Session) -> Result<T, String>) -> Result<T, String> {
    let mut guard = SESSION
        .lock()
        .map_err(|_| "session lock is poisoned".to_string())?;
    if guard.is_none() {
        let conn = open_db(resolve_db_path()).map_err(|err| format!("DB open failed: {err}"))?;
        *guard = Some(Session {
            conn,
            applied: None,
            source: None,
        });
    }
    match guard.as_mut() {
        Some(session) => f(session),
        None => Err("session is not initialized".to_string()),
    }
}

/// Settings with references a re-import removed already dropped.
fn load_settings(conn: &Connection) -> BrowseSettings {
    match load_effective_settings(conn) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("event=settings_load module=ffi status=fallback error={err}");
            BrowseSettings::default()
        }
    }
}

fn current_source(
    session: &mut Session,
    query: &EntryQuery,
    settings: &BrowseSettings,
) -> Result<EntryPagingSource, String> {
    if session.applied.as_ref() == Some(query) {
        if let Some(source) = session.source.as_ref() {
            if source.view_id() == settings.view_id {
                return Ok(source.clone());
            }
        }
    }

    let state = rebuild_cache(&mut session.conn, query).map_err(|err| err.to_string())?;
    let source = EntryPagingSource::new(&session.conn, state.generation, settings.view_id)
        .map_err(|err| err.to_string())?;
    session.applied = Some(query.clone());
    session.source = Some(source.clone());
    Ok(source)
}

fn to_browse_response(page: Page, applied_limit: u32) -> Result<BrowsePageResponse, String> {
    let page_len = u32::try_from(page.data.len())
        .map_err(|_| format!("page of {} rows does not fit in u32", page.data.len()))?;
    let total = page.items_before + page_len + page.items_after;
    let items = page
        .data
        .into_iter()
        .map(to_browse_item)
        .collect::<Vec<_>>();
    let message = if total == 0 {
        "No entries.".to_string()
    } else {
        format!("Found {total} entries.")
    };
    Ok(BrowsePageResponse {
        items,
        total,
        next_offset: page.next_key,
        applied_limit,
        message,
    })
}

fn to_browse_item(summary: EntrySummary) -> BrowseItem {
    BrowseItem {
        position: summary.position,
        lexeme_id: summary.lexeme.id,
        word: summary.lexeme.word,
        preview: summary.preview,
        is_bookmarked: summary.is_bookmarked,
    }
}

fn to_entry_detail(entry: DictionaryEntry) -> EntryDetail {
    EntryDetail {
        lexeme_id: entry.lexeme.id,
        word: entry.lexeme.word,
        base_form: entry.base_form.map(|lexeme| lexeme.word),
        full_forms: entry
            .full_forms
            .into_iter()
            .map(|lexeme| lexeme.word)
            .collect(),
        properties: entry
            .properties
            .into_iter()
            .map(|property| EntryDetailProperty {
                category: property.category.name,
                widget: property.category.widget.as_str().to_string(),
                value: property.value,
            })
            .collect(),
        is_bookmarked: entry.is_bookmarked,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        browse_page, core_version, entry_detail, import_bundled, init_logging, lookup_word,
        normalize_browse_limit, ping, toggle_bookmark, with_session,
    };
    use lexicon_core::{BrowseSettings, SettingsRepository, SortKey, SqliteSettingsRepository};
    use std::path::Path;
    use std::sync::Mutex;

    // Import tests share the process-wide session.
    static DICTIONARY_LOCK: Mutex<()> = Mutex::new(());

    const CATEGORIES_CSV: &str =
        "id,name,widget,sort_order\n1,Part of speech,chips,1\n2,Gloss,text,2\n";
    const LEXEMES_CSV: &str = "id,word,base_id\n1,apple,\n2,apples,1\n3,banana,\n";
    const PROPERTIES_CSV: &str =
        "lexeme_id,category_id,value\n1,1,noun\n1,2,a round fruit\n3,1,noun\n";

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn browse_limit_is_normalized() {
        assert_eq!(normalize_browse_limit(None), 50);
        assert_eq!(normalize_browse_limit(Some(0)), 50);
        assert_eq!(normalize_browse_limit(Some(500)), 200);
        assert_eq!(normalize_browse_limit(Some(20)), 20);
    }

    #[test]
    fn import_of_missing_path_reports_failure() {
        let response = import_bundled("/definitely/not/here.zip".to_string());
        assert!(!response.ok);
        assert!(response.message.starts_with("import_bundled failed"));
    }

    fn write_source(dir: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            std::fs::write(dir.join(name), content).expect("write fixture");
        }
    }

    #[test]
    fn import_browse_detail_and_bookmark_flow() {
        let _guard = DICTIONARY_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        let dir = tempfile::tempdir().expect("tempdir");
        write_source(
            dir.path(),
            &[
                ("categories.csv", CATEGORIES_CSV),
                ("lexemes.csv", LEXEMES_CSV),
                ("properties.csv", PROPERTIES_CSV),
            ],
        );
        with_session(|session| {
            SqliteSettingsRepository::new(&session.conn)
                .save_browse_settings(&BrowseSettings::default())
                .map_err(|err| err.to_string())
        })
        .expect("reset settings");

        let imported = import_bundled(dir.path().display().to_string());
        assert!(imported.ok, "{}", imported.message);
        assert_eq!(imported.lexemes, 3);

        let first = browse_page("ap".to_string(), 0, Some(1));
        assert_eq!(first.total, 2, "{}", first.message);
        assert_eq!(first.items[0].word, "apple");
        assert_eq!(first.items[0].preview, "noun");
        assert_eq!(first.next_offset, Some(1));

        let second = browse_page("ap".to_string(), 1, Some(1));
        assert_eq!(second.items[0].word, "apples");
        assert_eq!(second.next_offset, None);

        let apple = lookup_word("Apple".to_string()).expect("apple id");
        let detail = entry_detail(apple);
        assert!(detail.ok, "{}", detail.message);
        let entry = detail.entry.expect("apple entry");
        assert_eq!(entry.full_forms, ["apples"]);
        assert_eq!(entry.properties.len(), 2);
        assert_eq!(entry.properties[0].widget, "chips");

        let toggled = toggle_bookmark(apple);
        assert!(toggled.ok, "{}", toggled.message);
        let toggled_back = toggle_bookmark(apple);
        assert_eq!(toggled_back.bookmarked, !toggled.bookmarked);

        let missing = toggle_bookmark(-1);
        assert!(!missing.ok);
    }

    #[test]
    fn browse_recovers_from_settings_a_reimport_made_stale() {
        let _guard = DICTIONARY_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        let full = tempfile::tempdir().expect("tempdir");
        write_source(
            full.path(),
            &[
                ("categories.csv", CATEGORIES_CSV),
                ("lexemes.csv", LEXEMES_CSV),
                ("properties.csv", PROPERTIES_CSV),
            ],
        );
        assert!(import_bundled(full.path().display().to_string()).ok);

        let mut stale = BrowseSettings::default();
        stale.sort.key = SortKey::Category(2);
        stale.view_id = Some(1);
        with_session(|session| {
            SqliteSettingsRepository::new(&session.conn)
                .save_browse_settings(&stale)
                .map_err(|err| err.to_string())
        })
        .expect("save settings");

        let reduced = tempfile::tempdir().expect("tempdir");
        write_source(
            reduced.path(),
            &[
                ("categories.csv", "id,name,widget,sort_order\n1,Part of speech,chips,1\n"),
                ("lexemes.csv", "id,word,base_id\n1,pear,\n2,fig,\n"),
                ("properties.csv", "lexeme_id,category_id,value\n1,1,noun\n"),
            ],
        );
        let imported = import_bundled(reduced.path().display().to_string());
        assert!(imported.ok, "{}", imported.message);

        for _ in 0..2 {
            let page = browse_page(String::new(), 0, None);
            assert_eq!(page.total, 2, "{}", page.message);
            assert_eq!(page.items[0].word, "fig");
            assert_eq!(page.items[1].preview, "noun");
        }
        let detail = entry_detail(1);
        assert!(detail.ok, "{}", detail.message);

        let persisted = with_session(|session| {
            SqliteSettingsRepository::new(&session.conn)
                .load_browse_settings()
                .map_err(|err| err.to_string())
        })
        .expect("load settings");
        assert_eq!(persisted.sort.key, SortKey::Word);
        assert_eq!(persisted.view_id, None);
    }
}
