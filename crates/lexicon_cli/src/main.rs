//! CLI driver for the Lexicon core.
//!
//! # Responsibility
//! - Import dictionaries and browse the local store without a mobile shell.
//! - Keep output line-oriented so it can be diffed in quick sanity checks.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lexicon_core::db::open_db;
use lexicon_core::{
    cache_state, fetch_remote, import_dictionary, import_state, init_logging,
    load_effective_settings, rebuild_cache, BookmarkRepository, BrowseHandle, BrowseSettings,
    CoreConfig, DictionaryRepository, EntryPagingSource, EntryQuery, ImportSource, LexemeId,
    LoadParams, LoadResult, Page, SearchMode, SettingsRepository, SortKey,
    SqliteBookmarkRepository, SqliteDictionaryRepository, SqliteSettingsRepository,
};
use rusqlite::Connection;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;

#[derive(Parser, Debug)]
#[command(name = "lexicon")]
#[command(version)]
#[command(about = "Import and browse Lexicon dictionaries", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overrides the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a dictionary directory, ZIP archive or http(s) URL
    Import {
        /// Defaults to `bundled_source`, then `remote_url` from the configuration
        source: Option<String>,
    },

    /// Print one page of the filtered and sorted entry list
    Browse {
        #[arg(short, long, default_value = "")]
        search: String,
        /// prefix, contains or exact
        #[arg(long)]
        mode: Option<String>,
        /// Also match property values
        #[arg(long)]
        properties: bool,
        /// word, length, id or category:<id>
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        bookmarked: bool,
        /// Hide full forms
        #[arg(long)]
        base_only: bool,
        /// Dictionary view used for previews
        #[arg(long)]
        view: Option<i64>,
        #[arg(long, default_value = "0")]
        offset: u32,
        /// Defaults to `page_size` from the configuration
        #[arg(long)]
        limit: Option<u32>,
        /// Persist sort, filter and view as the new browse settings
        #[arg(long)]
        save: bool,
    },

    /// Show one entry by id or headword
    Show {
        entry: String,
        #[arg(long)]
        view: Option<i64>,
    },

    /// Toggle the bookmark of one entry
    Bookmark { entry: String },

    /// List bookmarks, newest first
    Bookmarks,

    /// Print dictionary and cache metadata
    Status,

    /// Read search text from stdin and print the first page of every rebuild
    Watch,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match args.config.as_deref() {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => CoreConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    config.validate()?;

    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, &log_dir.to_string_lossy()).map_err(anyhow::Error::msg)?;
    }

    let Some(command) = args.command else {
        println!("lexicon_core ping={}", lexicon_core::ping());
        println!("lexicon_core version={}", lexicon_core::core_version());
        return Ok(());
    };

    let mut conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open `{}`", config.db_path.display()))?;

    match command {
        Commands::Import { source } => run_import(&mut conn, &config, source),
        Commands::Browse {
            search,
            mode,
            properties,
            sort,
            desc,
            bookmarked,
            base_only,
            view,
            offset,
            limit,
            save,
        } => {
            let mut settings = load_effective_settings(&conn)?;
            if let Some(mode) = mode.as_deref() {
                settings.filter.search_mode = parse_mode(mode)?;
            }
            settings.filter.search_properties |= properties;
            settings.filter.bookmarked_only |= bookmarked;
            settings.filter.base_forms_only |= base_only;
            if let Some(sort) = sort.as_deref() {
                settings.sort.key = parse_sort(sort)?;
            }
            settings.sort.descending |= desc;
            if view.is_some() {
                settings.view_id = view;
            }
            let limit = limit.unwrap_or(config.page_size);
            run_browse(&mut conn, &settings, &search, offset, limit)?;
            if save {
                SqliteSettingsRepository::new(&conn).save_browse_settings(&settings)?;
            }
            Ok(())
        }
        Commands::Show { entry, view } => run_show(&conn, &entry, view),
        Commands::Bookmark { entry } => {
            let id = resolve_entry(&conn, &entry)?;
            let bookmarked = SqliteBookmarkRepository::new(&conn).toggle_bookmark(id)?;
            println!("id={id} bookmarked={bookmarked}");
            Ok(())
        }
        Commands::Bookmarks => {
            for bookmark in SqliteBookmarkRepository::new(&conn).list_bookmarks()? {
                println!(
                    "{}\t{}\tcreated_at={}",
                    bookmark.lexeme.id, bookmark.lexeme.word, bookmark.created_at
                );
            }
            Ok(())
        }
        Commands::Status => run_status(&conn),
        Commands::Watch => run_watch(conn, &config),
    }
}

fn run_import(conn: &mut Connection, config: &CoreConfig, source: Option<String>) -> Result<()> {
    let source = match source {
        Some(source) => source,
        None => match (&config.bundled_source, &config.remote_url) {
            (Some(path), _) => path.to_string_lossy().into_owned(),
            (None, Some(url)) => url.clone(),
            (None, None) => bail!("no import source given and none configured"),
        },
    };

    let source = if source.starts_with("https://") || source.starts_with("http://") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(fetch_remote(&source))?
    } else {
        ImportSource::from_path(source)
    };

    let report = import_dictionary(conn, &source)?;
    println!(
        "run_id={} source={} version={} categories={} lexemes={} properties={} views={} bookmarks_kept={} duration_ms={}",
        report.run_id,
        report.source,
        report.version.as_deref().unwrap_or("-"),
        report.categories,
        report.lexemes,
        report.properties,
        report.views,
        report.bookmarks_kept,
        report.duration_ms
    );
    Ok(())
}

fn run_browse(
    conn: &mut Connection,
    settings: &BrowseSettings,
    search: &str,
    offset: u32,
    limit: u32,
) -> Result<()> {
    let query = EntryQuery::from_settings(settings, search);
    let state = rebuild_cache(conn, &query)?;
    let source = EntryPagingSource::new(conn, state.generation, settings.view_id)?;
    let page = match source.load(conn, LoadParams::refresh(Some(offset), limit))? {
        LoadResult::Page(page) => page,
        LoadResult::Invalid => bail!("entry cache changed during load; retry"),
    };

    print_page(&page, state.total);
    Ok(())
}

fn print_page(page: &Page, total: u32) {
    for row in &page.data {
        let marker = if row.is_bookmarked { "*" } else { " " };
        println!(
            "{:>6} {marker} {}\t{}\t{}",
            row.position, row.lexeme.id, row.lexeme.word, row.preview
        );
    }
    let next_offset = page
        .next_key
        .map_or_else(|| "-".to_string(), |key| key.to_string());
    println!(
        "total={total} items_before={} items_after={} next_offset={next_offset}",
        page.items_before, page.items_after
    );
}

/// Drives the browse pipeline from stdin: each line is new search text,
/// `:refresh` forces a rebuild, `:quit` or EOF stops.
fn run_watch(conn: Connection, config: &CoreConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let handle = BrowseHandle::spawn_from_config(conn, config)?;
        let mut snapshots = handle.subscribe();
        print_first_page(&handle, config.page_size)?;

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) if line.trim() == ":quit" => break,
                    Some(line) if line.trim() == ":refresh" => handle.refresh(),
                    Some(line) => handle.set_search(line),
                    None => break,
                },
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    match snapshot.last_error {
                        Some(message) => eprintln!("rebuild failed: {message}"),
                        None => print_first_page(&handle, config.page_size)?,
                    }
                }
            }
        }

        handle.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}

fn print_first_page(handle: &BrowseHandle, limit: u32) -> Result<()> {
    let source = handle.paging_source()?;
    match handle.load(&source, LoadParams::refresh(None, limit))? {
        LoadResult::Page(page) => {
            let total = page.items_before + page.items_after + page_len(&page)?;
            print_page(&page, total);
        }
        LoadResult::Invalid => println!("(list changed, waiting for the next rebuild)"),
    }
    Ok(())
}

fn page_len(page: &Page) -> Result<u32> {
    u32::try_from(page.data.len()).context("page holds more rows than fit in u32")
}

fn run_show(conn: &Connection, entry: &str, view: Option<i64>) -> Result<()> {
    let id = resolve_entry(conn, entry)?;
    let Some(entry) = SqliteDictionaryRepository::new(conn).get_entry(id, view)? else {
        bail!("entry {id} not found");
    };

    println!("{} (id={})", entry.lexeme.word, entry.lexeme.id);
    if let Some(base_form) = entry.base_form.as_ref() {
        println!("  base form: {}", base_form.word);
    }
    if !entry.full_forms.is_empty() {
        let forms = entry
            .full_forms
            .iter()
            .map(|lexeme| lexeme.word.as_str())
            .collect::<Vec<_>>();
        println!("  full forms: {}", forms.join(", "));
    }
    for property in &entry.properties {
        println!(
            "  {} [{}]: {}",
            property.category.name,
            property.category.widget.as_str(),
            property.value
        );
    }
    println!("  bookmarked: {}", entry.is_bookmarked);
    Ok(())
}

fn run_status(conn: &Connection) -> Result<()> {
    match import_state(conn)? {
        Some(state) => println!(
            "source={} version={} imported_at={} categories={} lexemes={} properties={} views={}",
            state.source,
            state.version.as_deref().unwrap_or("-"),
            state.imported_at,
            state.categories,
            state.lexemes,
            state.properties,
            state.views
        ),
        None => println!("no dictionary imported"),
    }
    let cache = cache_state(conn)?;
    println!("cache generation={} total={}", cache.generation, cache.total);
    Ok(())
}

/// Accepts a numeric id or a headword.
fn resolve_entry(conn: &Connection, entry: &str) -> Result<LexemeId> {
    if let Ok(id) = entry.trim().parse::<LexemeId>() {
        return Ok(id);
    }
    let matches = SqliteDictionaryRepository::new(conn).find_by_word(entry)?;
    match matches.first() {
        Some(lexeme) => Ok(lexeme.id),
        None => bail!("no entry named `{}`", entry.trim()),
    }
}

fn parse_mode(mode: &str) -> Result<SearchMode> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "prefix" => Ok(SearchMode::Prefix),
        "contains" => Ok(SearchMode::Contains),
        "exact" => Ok(SearchMode::Exact),
        other => bail!("unknown search mode `{other}`"),
    }
}

fn parse_sort(sort: &str) -> Result<SortKey> {
    let sort = sort.trim().to_ascii_lowercase();
    match sort.as_str() {
        "word" => Ok(SortKey::Word),
        "length" => Ok(SortKey::WordLength),
        "id" => Ok(SortKey::Id),
        _ => match sort.strip_prefix("category:") {
            Some(id) => Ok(SortKey::Category(
                id.parse()
                    .with_context(|| format!("invalid category id `{id}`"))?,
            )),
            None => bail!("unknown sort `{sort}`"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_mode, parse_sort, Args, Commands};
    use clap::Parser;
    use lexicon_core::{SearchMode, SortKey};

    #[test]
    fn sort_keys_parse() {
        assert_eq!(parse_sort("Word").unwrap(), SortKey::Word);
        assert_eq!(parse_sort("length").unwrap(), SortKey::WordLength);
        assert_eq!(parse_sort("category:3").unwrap(), SortKey::Category(3));
        assert!(parse_sort("category:x").is_err());
        assert!(parse_sort("color").is_err());
    }

    #[test]
    fn search_modes_parse() {
        assert_eq!(parse_mode("contains").unwrap(), SearchMode::Contains);
        assert!(parse_mode("fuzzy").is_err());
    }

    #[test]
    fn watch_and_browse_parse_with_global_db() {
        let args = Args::try_parse_from(["lexicon", "watch", "--db", "dict.sqlite3"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Watch)));
        assert_eq!(args.db.unwrap().to_str(), Some("dict.sqlite3"));

        let args =
            Args::try_parse_from(["lexicon", "browse", "--sort", "length", "--save"]).unwrap();
        match args.command {
            Some(Commands::Browse { sort, save, limit, .. }) => {
                assert_eq!(sort.as_deref(), Some("length"));
                assert!(save);
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
