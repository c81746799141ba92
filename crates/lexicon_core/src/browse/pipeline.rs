//! Reactive browse pipeline.
//!
//! # Responsibility
//! - Own the browse configuration (persisted settings + live search text).
//! - Rebuild the position cache on every settings change and on debounced
//!   search input, then publish the new generation to subscribers.
//! - Keep SQLite work on the blocking pool, off the async worker.
//!
//! # Invariants
//! - One worker task performs every rebuild; rebuilds never overlap.
//! - Only the last search text inside one debounce window is applied.
//! - A search that normalizes to the applied text does not rebuild.
//! - A failed rebuild keeps the previous generation and is reported through
//!   `BrowseSnapshot::last_error`; the worker keeps running.

use crate::browse::cache::{cache_state, rebuild_cache, CacheError, CacheState};
use crate::browse::paging::{EntryPagingSource, LoadParams, LoadResult, PagingError};
use crate::import::{import_dictionary, ImportError, ImportReport, ImportSource};
use crate::model::entry::DictionaryEntry;
use crate::model::lexeme::{LexemeId, ViewId};
use crate::config::CoreConfig;
use crate::query::filter::{normalize_search, BrowseSettings, EntryQuery};
use crate::repo::bookmark_repo::{BookmarkRepository, SqliteBookmarkRepository};
use crate::repo::dictionary_repo::{DictionaryRepository, RepoError, SqliteDictionaryRepository};
use crate::repo::settings_repo::{
    load_effective_settings, sanitize_browse_settings, SettingsRepository,
    SqliteSettingsRepository,
};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

/// Connection shared between the handle and its worker task.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug)]
pub enum PipelineError {
    Cache(CacheError),
    Repo(RepoError),
    Paging(PagingError),
    Import(ImportError),
    /// A thread panicked while holding the connection lock.
    ConnectionPoisoned,
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Paging(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::ConnectionPoisoned => write!(f, "dictionary connection lock is poisoned"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cache(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Paging(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::ConnectionPoisoned => None,
        }
    }
}

impl From<CacheError> for PipelineError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<RepoError> for PipelineError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<PagingError> for PipelineError {
    fn from(value: PagingError) -> Self {
        Self::Paging(value)
    }
}

impl From<ImportError> for PipelineError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

/// State published after every rebuild attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseSnapshot {
    pub generation: u64,
    pub total: u32,
    /// Query the current cache was built from.
    pub query: EntryQuery,
    pub view_id: Option<ViewId>,
    pub page_size: u32,
    /// Message of the last failed rebuild, cleared by the next success.
    pub last_error: Option<String>,
}

/// Front door of the browse pipeline.
pub struct BrowseHandle {
    conn: SharedConnection,
    settings_tx: watch::Sender<BrowseSettings>,
    search_tx: watch::Sender<String>,
    refresh_tx: watch::Sender<u64>,
    snapshot_rx: watch::Receiver<BrowseSnapshot>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl BrowseHandle {
    /// Starts the pipeline with settings persisted in `conn`.
    ///
    /// Must be called inside a tokio runtime. Undecodable persisted settings
    /// fall back to defaults; stale category and view references are dropped.
    pub fn spawn(conn: Connection, debounce: Duration) -> PipelineResult<Self> {
        let settings = load_effective_settings(&conn)?;
        Self::spawn_with_settings(conn, settings, debounce)
    }

    /// Starts the pipeline with the configured debounce window.
    pub fn spawn_from_config(conn: Connection, config: &CoreConfig) -> PipelineResult<Self> {
        Self::spawn(conn, config.search_debounce())
    }

    /// Starts the pipeline with explicit settings and performs the first rebuild.
    pub fn spawn_with_settings(
        mut conn: Connection,
        mut settings: BrowseSettings,
        debounce: Duration,
    ) -> PipelineResult<Self> {
        sanitize_browse_settings(&conn, &mut settings)?;
        let query = EntryQuery::from_settings(&settings, "");
        let state = rebuild_cache(&mut conn, &query)?;

        let snapshot = BrowseSnapshot {
            generation: state.generation,
            total: state.total,
            query: query.clone(),
            view_id: settings.view_id,
            page_size: settings.page_size,
            last_error: None,
        };

        let conn: SharedConnection = Arc::new(Mutex::new(conn));
        let (settings_tx, settings_rx) = watch::channel(settings.clone());
        let (search_tx, search_rx) = watch::channel(String::new());
        let (refresh_tx, refresh_rx) = watch::channel(0_u64);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            conn: Arc::clone(&conn),
            snapshot_tx,
            settings,
            search_text: String::new(),
            applied: query,
        };
        let task = tokio::spawn(worker.run(
            settings_rx,
            search_rx,
            refresh_rx,
            shutdown_rx,
            debounce,
        ));
        info!(
            "event=pipeline_start module=browse status=ok debounce_ms={}",
            debounce.as_millis()
        );

        Ok(Self {
            conn,
            settings_tx,
            search_tx,
            refresh_tx,
            snapshot_rx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> BrowseSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified after every rebuild attempt.
    pub fn subscribe(&self) -> watch::Receiver<BrowseSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Settings as last requested through this handle.
    pub fn settings(&self) -> BrowseSettings {
        self.settings_tx.borrow().clone()
    }

    /// Changes settings; the worker persists them and rebuilds immediately.
    pub fn update_settings(&self, modify: impl FnOnce(&mut BrowseSettings)) {
        self.settings_tx.send_modify(modify);
    }

    /// Feeds raw search input; applied after the debounce window.
    pub fn set_search(&self, text: impl Into<String>) {
        self.search_tx.send_replace(text.into());
    }

    /// Forces a rebuild with the current configuration.
    pub fn refresh(&self) {
        self.refresh_tx.send_modify(|counter| *counter = counter.wrapping_add(1));
    }

    /// Creates a paging source bound to the latest generation.
    pub fn paging_source(&self) -> PipelineResult<EntryPagingSource> {
        let snapshot = self.snapshot();
        let conn = self.lock()?;
        Ok(EntryPagingSource::new(
            &conn,
            snapshot.generation,
            snapshot.view_id,
        )?)
    }

    /// Loads one page through `source`.
    pub fn load(
        &self,
        source: &EntryPagingSource,
        params: LoadParams,
    ) -> PipelineResult<LoadResult> {
        let conn = self.lock()?;
        Ok(source.load(&conn, params)?)
    }

    /// Resolves one entry using the active dictionary view.
    pub fn entry(&self, id: LexemeId) -> PipelineResult<Option<DictionaryEntry>> {
        let view_id = self.snapshot().view_id;
        let conn = self.lock()?;
        Ok(SqliteDictionaryRepository::new(&conn).get_entry(id, view_id)?)
    }

    /// Flips a bookmark; rebuilds when the list only shows bookmarks.
    pub fn toggle_bookmark(&self, id: LexemeId) -> PipelineResult<bool> {
        let bookmarked = {
            let conn = self.lock()?;
            SqliteBookmarkRepository::new(&conn).toggle_bookmark(id)?
        };
        if self.snapshot().query.filter.bookmarked_only {
            self.refresh();
        }
        Ok(bookmarked)
    }

    /// Imports a dictionary and rebuilds the cache afterwards.
    ///
    /// Settings that reference categories or a view the new dictionary lacks
    /// are reset before the rebuild.
    pub fn import(&self, source: &ImportSource) -> PipelineResult<ImportReport> {
        let mut settings = self.settings();
        let (report, changed) = {
            let mut conn = self.lock()?;
            let report = import_dictionary(&mut conn, source)?;
            (report, sanitize_browse_settings(&conn, &mut settings)?)
        };
        if changed {
            self.update_settings(|current| *current = settings);
        } else {
            self.refresh();
        }
        Ok(report)
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> PipelineResult<T> {
        let mut conn = self.lock()?;
        Ok(f(&mut conn))
    }

    /// Stops the worker and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!("event=pipeline_stop module=browse status=error error={err}");
                return;
            }
        }
        info!("event=pipeline_stop module=browse status=ok");
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PipelineError::ConnectionPoisoned)
    }
}

struct Worker {
    conn: SharedConnection,
    snapshot_tx: watch::Sender<BrowseSnapshot>,
    settings: BrowseSettings,
    search_text: String,
    applied: EntryQuery,
}

impl Worker {
    async fn run(
        mut self,
        mut settings_rx: watch::Receiver<BrowseSettings>,
        mut search_rx: watch::Receiver<String>,
        mut refresh_rx: watch::Receiver<u64>,
        mut shutdown_rx: oneshot::Receiver<()>,
        debounce: Duration,
    ) {
        let mut search_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                changed = settings_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let settings = settings_rx.borrow_and_update().clone();
                    self.apply_settings(settings).await;
                }
                changed = search_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    search_deadline = Some(Instant::now() + debounce);
                }
                changed = refresh_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let query = self.applied.clone();
                    self.rebuild(query, None).await;
                }
                _ = sleep_until(search_deadline.unwrap_or_else(Instant::now)),
                    if search_deadline.is_some() =>
                {
                    search_deadline = None;
                    let text = search_rx.borrow_and_update().clone();
                    self.apply_search(text).await;
                }
            }
        }
    }

    async fn apply_settings(&mut self, settings: BrowseSettings) {
        self.settings = settings;
        let query = EntryQuery::from_settings(&self.settings, &self.search_text);
        let persist = self.settings.clone();
        self.rebuild(query, Some(persist)).await;
    }

    async fn apply_search(&mut self, text: String) {
        if normalize_search(&text) == self.applied.filter.search {
            self.search_text = text;
            return;
        }
        self.search_text = text;
        let query = EntryQuery::from_settings(&self.settings, &self.search_text);
        self.rebuild(query, None).await;
    }

    /// Persists `persist` when given, then rebuilds the cache off the runtime thread.
    async fn rebuild(&mut self, query: EntryQuery, persist: Option<BrowseSettings>) {
        let conn = Arc::clone(&self.conn);
        let job_query = query.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            rebuild_blocking(&conn, &job_query, persist.as_ref())
        })
        .await
        .unwrap_or_else(|err| RebuildOutcome {
            result: Err(format!("rebuild task failed: {err}")),
            current: None,
        });

        match outcome.result {
            Ok(state) => {
                self.applied = query.clone();
                self.snapshot_tx.send_replace(BrowseSnapshot {
                    generation: state.generation,
                    total: state.total,
                    query,
                    view_id: self.settings.view_id,
                    page_size: self.settings.page_size,
                    last_error: None,
                });
            }
            Err(message) => {
                let mut snapshot = self.snapshot_tx.borrow().clone();
                // Imports bump the generation even when the rebuild fails.
                if let Some(state) = outcome.current {
                    snapshot.generation = state.generation;
                    snapshot.total = state.total;
                }
                snapshot.last_error = Some(message);
                self.snapshot_tx.send_replace(snapshot);
            }
        }
    }
}

struct RebuildOutcome {
    result: Result<CacheState, String>,
    /// Cache state after a failed rebuild.
    current: Option<CacheState>,
}

fn rebuild_blocking(
    conn: &SharedConnection,
    query: &EntryQuery,
    persist: Option<&BrowseSettings>,
) -> RebuildOutcome {
    let mut conn = match conn.lock() {
        Ok(conn) => conn,
        Err(_) => {
            return RebuildOutcome {
                result: Err(PipelineError::ConnectionPoisoned.to_string()),
                current: None,
            }
        }
    };
    if let Some(settings) = persist {
        if let Err(err) = SqliteSettingsRepository::new(&conn).save_browse_settings(settings) {
            error!("event=settings_save module=browse status=error error={err}");
        }
    }
    match rebuild_cache(&mut conn, query) {
        Ok(state) => RebuildOutcome {
            result: Ok(state),
            current: None,
        },
        Err(err) => RebuildOutcome {
            result: Err(err.to_string()),
            current: cache_state(&conn).ok(),
        },
    }
}
