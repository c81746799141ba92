//! Dictionary import from bundled or remote CSV/ZIP sources.
//!
//! # Responsibility
//! - Read `categories.csv`, `lexemes.csv`, `properties.csv`, the optional
//!   `views.csv` and `version.txt` from a directory or a ZIP archive.
//! - Validate cross-file references before any write.
//! - Replace the stored dictionary in one transaction.
//!
//! # Invariants
//! - A failed import leaves the previous dictionary, bookmarks and entry
//!   cache untouched.
//! - Bookmarks survive re-import for every lexeme id still present.
//! - Every successful import bumps the entry cache generation.

use crate::db::DbError;
use log::{error, info};
use rusqlite::{Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

mod records;
mod remote;
mod source;
mod writer;

pub use records::{DictionaryData, Sourced};
pub use remote::fetch_remote;

pub const CATEGORIES_FILE: &str = "categories.csv";
pub const LEXEMES_FILE: &str = "lexemes.csv";
pub const PROPERTIES_FILE: &str = "properties.csv";
pub const VIEWS_FILE: &str = "views.csv";
pub const VERSION_FILE: &str = "version.txt";

pub type ImportResult<T> = Result<T, ImportError>;

/// Import-layer error for reading, validating and writing dictionary data.
#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Zip(zip::result::ZipError),
    Csv {
        file: &'static str,
        source: csv::Error,
    },
    /// Required source file is absent.
    MissingFile(&'static str),
    /// Record-level or cross-file validation failure at a 1-based file line.
    Validation {
        file: &'static str,
        line: u64,
        message: String,
    },
    Http(reqwest::Error),
    HttpStatus {
        url: String,
        status: u16,
    },
    Db(DbError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Zip(err) => write!(f, "invalid dictionary archive: {err}"),
            Self::Csv { file, source } => write!(f, "cannot parse {file}: {source}"),
            Self::MissingFile(file) => write!(f, "dictionary source is missing {file}"),
            Self::Validation {
                file,
                line,
                message,
            } => write!(f, "{file}:{line}: {message}"),
            Self::Http(err) => write!(f, "dictionary download failed: {err}"),
            Self::HttpStatus { url, status } => {
                write!(f, "dictionary download from `{url}` returned HTTP {status}")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Zip(err) => Some(err),
            Self::Csv { source, .. } => Some(source),
            Self::MissingFile(_) => None,
            Self::Validation { .. } => None,
            Self::Http(err) => Some(err),
            Self::HttpStatus { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<zip::result::ZipError> for ImportError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Zip(value)
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<DbError> for ImportError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Where dictionary files are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// Directory holding the CSV files (bundled assets unpacked on disk).
    Directory(PathBuf),
    /// ZIP archive on disk.
    ZipFile(PathBuf),
    /// ZIP archive already in memory, e.g. a remote download.
    ZipBytes { label: String, bytes: Vec<u8> },
}

impl ImportSource {
    /// Picks `Directory` for directories and `ZipFile` otherwise.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::ZipFile(path)
        }
    }

    /// Human-readable label stored in `import_state.source`.
    pub fn label(&self) -> String {
        match self {
            Self::Directory(path) => format!("dir:{}", path.display()),
            Self::ZipFile(path) => format!("zip:{}", path.display()),
            Self::ZipBytes { label, .. } => label.clone(),
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Directory(_) => "directory",
            Self::ZipFile(_) => "zip_file",
            Self::ZipBytes { .. } => "zip_bytes",
        }
    }
}

/// Summary of one successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Correlates log lines of one import run.
    pub run_id: Uuid,
    pub source: String,
    pub version: Option<String>,
    pub categories: usize,
    pub lexemes: usize,
    pub properties: usize,
    pub views: usize,
    pub bookmarks_kept: usize,
    pub duration_ms: u128,
}

/// Metadata of the dictionary currently in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportState {
    pub source: String,
    pub version: Option<String>,
    /// Epoch milliseconds.
    pub imported_at: i64,
    pub categories: u32,
    pub lexemes: u32,
    pub properties: u32,
    pub views: u32,
}

/// Reads and validates a source without writing anything.
pub fn read_source(source: &ImportSource) -> ImportResult<DictionaryData> {
    let mut files = source::open(source)?;
    records::read_dictionary(files.as_mut())
}

/// Replaces the stored dictionary with the content of `source`.
///
/// # Side effects
/// - Clears the entry cache and bumps its generation.
/// - Emits `dictionary_import` logging events keyed by `run_id`.
pub fn import_dictionary(
    conn: &mut Connection,
    source: &ImportSource,
) -> ImportResult<ImportReport> {
    let started_at = Instant::now();
    let run_id = Uuid::new_v4();
    let label = source.label();
    info!(
        "event=dictionary_import module=import status=start run_id={run_id} mode={}",
        source.mode()
    );

    let result = read_source(source)
        .and_then(|data| writer::write_dictionary(conn, &data, &label).map(|kept| (data, kept)));

    match result {
        Ok((data, bookmarks_kept)) => {
            let report = ImportReport {
                run_id,
                source: label,
                version: data.version.clone(),
                categories: data.categories.len(),
                lexemes: data.lexemes.len(),
                properties: data.properties.len(),
                views: data.views.len(),
                bookmarks_kept,
                duration_ms: started_at.elapsed().as_millis(),
            };
            info!(
                "event=dictionary_import module=import status=ok run_id={run_id} duration_ms={} categories={} lexemes={} properties={} views={} bookmarks_kept={}",
                report.duration_ms,
                report.categories,
                report.lexemes,
                report.properties,
                report.views,
                report.bookmarks_kept
            );
            Ok(report)
        }
        Err(err) => {
            error!(
                "event=dictionary_import module=import status=error run_id={run_id} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Reads metadata of the last successful import.
pub fn import_state(conn: &Connection) -> ImportResult<Option<ImportState>> {
    let state = conn
        .query_row(
            "SELECT source, version, imported_at, categories, lexemes, properties, views
             FROM import_state
             WHERE id = 1;",
            [],
            |row| {
                Ok(ImportState {
                    source: row.get(0)?,
                    version: row.get(1)?,
                    imported_at: row.get(2)?,
                    categories: row.get(3)?,
                    lexemes: row.get(4)?,
                    properties: row.get(5)?,
                    views: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(state)
}

/// Returns whether the store is empty or holds a different dictionary version.
///
/// `expected_version = None` only checks for emptiness.
pub fn needs_import(conn: &Connection, expected_version: Option<&str>) -> ImportResult<bool> {
    let Some(state) = import_state(conn)? else {
        return Ok(true);
    };
    if state.lexemes == 0 {
        return Ok(true);
    }
    match expected_version {
        Some(expected) => Ok(state.version.as_deref() != Some(expected.trim())),
        None => Ok(false),
    }
}
