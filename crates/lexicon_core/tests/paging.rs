mod common;

use common::{imported_db, lexeme_id_of};
use lexicon_core::{
    rebuild_cache, refresh_key, BookmarkRepository, EntryPagingSource, EntryQuery, LoadParams,
    LoadResult, Page, PagingError, RepoError, SqliteBookmarkRepository,
};
use rusqlite::Connection;

fn prepared() -> (Connection, EntryPagingSource) {
    let mut conn = imported_db();
    let state = rebuild_cache(&mut conn, &EntryQuery::default()).unwrap();
    let source = EntryPagingSource::new(&conn, state.generation, None).unwrap();
    (conn, source)
}

fn page(result: LoadResult) -> Page {
    match result {
        LoadResult::Page(page) => page,
        LoadResult::Invalid => panic!("expected a page"),
    }
}

fn words(page: &Page) -> Vec<&str> {
    page.data.iter().map(|row| row.lexeme.word.as_str()).collect()
}

#[test]
fn refresh_without_key_starts_at_first_position() {
    let (conn, source) = prepared();
    let first = page(source.load(&conn, LoadParams::refresh(None, 3)).unwrap());

    assert_eq!(words(&first), ["apple", "apples", "bake"]);
    assert_eq!(first.data[0].position, 0);
    assert_eq!(first.prev_key, None);
    assert_eq!(first.next_key, Some(3));
    assert_eq!(first.items_before, 0);
    assert_eq!(first.items_after, 4);
}

#[test]
fn append_walks_to_the_end_and_stops() {
    let (conn, source) = prepared();
    let second = page(source.load(&conn, LoadParams::append(3, 3)).unwrap());
    assert_eq!(words(&second), ["Banana", "band", "bands"]);
    assert_eq!(second.next_key, Some(6));

    let last = page(source.load(&conn, LoadParams::append(6, 3)).unwrap());
    assert_eq!(words(&last), ["cherry"]);
    assert_eq!(last.next_key, None);
    assert_eq!(last.items_after, 0);
    assert_eq!(last.prev_key, Some(6));
}

#[test]
fn prepend_loads_the_window_before_the_key() {
    let (conn, source) = prepared();
    let before = page(source.load(&conn, LoadParams::prepend(5, 3)).unwrap());

    assert_eq!(words(&before), ["bake", "Banana", "band"]);
    assert_eq!(before.prev_key, Some(2));
    assert_eq!(before.next_key, Some(5));
    assert_eq!(before.items_before, 2);
    assert_eq!(before.items_after, 2);
}

#[test]
fn key_past_the_end_yields_an_empty_last_page() {
    let (conn, source) = prepared();
    let empty = page(source.load(&conn, LoadParams::refresh(Some(100), 10)).unwrap());

    assert!(empty.data.is_empty());
    assert_eq!(empty.next_key, None);
    assert_eq!(empty.items_before, 7);
}

#[test]
fn rebuild_invalidates_existing_sources() {
    let (mut conn, stale) = prepared();
    let state = rebuild_cache(&mut conn, &EntryQuery::default()).unwrap();

    assert_eq!(
        stale.load(&conn, LoadParams::refresh(None, 3)).unwrap(),
        LoadResult::Invalid
    );

    let fresh = EntryPagingSource::new(&conn, state.generation, None).unwrap();
    assert!(matches!(
        fresh.load(&conn, LoadParams::refresh(None, 3)).unwrap(),
        LoadResult::Page(_)
    ));
}

#[test]
fn refresh_around_an_anchor_keeps_it_in_view() {
    let (conn, source) = prepared();
    let key = refresh_key(Some(5), 4);
    let around = page(source.load(&conn, LoadParams::refresh(key, 4)).unwrap());

    assert_eq!(around.items_before, 3);
    assert!(around.data.iter().any(|row| row.position == 5));
}

#[test]
fn preview_uses_first_category_without_a_view() {
    let (conn, source) = prepared();
    let rows = page(source.load(&conn, LoadParams::refresh(None, 7)).unwrap()).data;

    assert_eq!(rows[0].preview, "noun");
    assert_eq!(rows[2].preview, "verb");
    // bands has no part of speech.
    assert_eq!(rows[5].preview, "");
}

#[test]
fn preview_follows_the_active_view() {
    let mut conn = imported_db();
    let state = rebuild_cache(&mut conn, &EntryQuery::default()).unwrap();
    let source = EntryPagingSource::new(&conn, state.generation, Some(1)).unwrap();
    let rows = page(source.load(&conn, LoadParams::refresh(None, 1)).unwrap()).data;

    assert_eq!(rows[0].lexeme.word, "apple");
    assert_eq!(rows[0].preview, "a round fruit");
}

#[test]
fn unknown_view_is_rejected() {
    let (conn, _) = prepared();
    let err = EntryPagingSource::new(&conn, 1, Some(42)).unwrap_err();
    assert!(matches!(err, PagingError::Repo(RepoError::UnknownView(42))));
}

#[test]
fn rows_report_bookmark_state() {
    let (conn, source) = prepared();
    SqliteBookmarkRepository::new(&conn)
        .set_bookmark(lexeme_id_of(&conn, "apples"), true)
        .unwrap();

    let rows = page(source.load(&conn, LoadParams::refresh(None, 2)).unwrap()).data;
    assert!(!rows[0].is_bookmarked);
    assert!(rows[1].is_bookmarked);
    assert_eq!(rows[1].lexeme.base_id, Some(lexeme_id_of(&conn, "apple")));
}
