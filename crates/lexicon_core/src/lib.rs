//! Core domain logic for the Lexicon dictionary browser.
//! This crate is the single source of truth for import, browse and bookmark
//! invariants; UI shells only call into it.

pub mod browse;
pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use browse::cache::{cache_state, position_of, rebuild_cache, CacheError, CacheState};
pub use browse::paging::{
    refresh_key, EntryPagingSource, LoadKind, LoadParams, LoadResult, Page, PagingError,
};
pub use browse::pipeline::{BrowseHandle, BrowseSnapshot, PipelineError, PipelineResult};
pub use config::{ConfigError, CoreConfig};
pub use import::{
    fetch_remote, import_dictionary, import_state, needs_import, ImportError, ImportReport,
    ImportSource, ImportState,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entry::{DictionaryEntry, EntryProperty, EntrySummary};
pub use model::lexeme::{
    Category, CategoryId, DictionaryView, Lexeme, LexemeId, Property, ViewId, WidgetType,
};
pub use query::filter::{
    BrowseSettings, CategoryValueFilter, EntryFilter, EntryQuery, EntrySort, SearchMode, SortKey,
};
pub use query::QueryError;
pub use repo::bookmark_repo::{Bookmark, BookmarkRepository, SqliteBookmarkRepository};
pub use repo::dictionary_repo::{
    DictionaryRepository, RepoError, RepoResult, SqliteDictionaryRepository,
};
pub use repo::settings_repo::{
    load_effective_settings, sanitize_browse_settings, SettingsRepository,
    SqliteSettingsRepository,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
