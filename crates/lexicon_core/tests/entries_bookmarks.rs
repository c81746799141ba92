mod common;

use common::{imported_db, lexeme_id_of};
use lexicon_core::{
    BookmarkRepository, BrowseSettings, CategoryValueFilter, DictionaryRepository, EntrySort,
    RepoError, SearchMode, SettingsRepository, SortKey, SqliteBookmarkRepository,
    SqliteDictionaryRepository, SqliteSettingsRepository, WidgetType,
};

#[test]
fn entry_lists_full_forms_and_ordered_properties() {
    let conn = imported_db();
    let band = lexeme_id_of(&conn, "band");
    let entry = SqliteDictionaryRepository::new(&conn)
        .get_entry(band, None)
        .unwrap()
        .unwrap();

    assert_eq!(entry.lexeme.word, "band");
    assert!(entry.base_form.is_none());
    let full_forms = entry
        .full_forms
        .iter()
        .map(|lexeme| lexeme.word.as_str())
        .collect::<Vec<_>>();
    assert_eq!(full_forms, ["bands"]);

    let properties = entry
        .properties
        .iter()
        .map(|property| (property.category.name.as_str(), property.value.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        properties,
        [
            ("Part of speech", "noun"),
            ("Gloss", "a group of musicians"),
            ("Inflection", "bands"),
        ]
    );
    assert_eq!(entry.properties[2].category.widget, WidgetType::Table);
    assert!(!entry.is_bookmarked);
}

#[test]
fn full_form_entry_links_its_base_form() {
    let conn = imported_db();
    let entry = SqliteDictionaryRepository::new(&conn)
        .get_entry(lexeme_id_of(&conn, "apples"), None)
        .unwrap()
        .unwrap();

    assert_eq!(entry.base_form.unwrap().word, "apple");
    assert!(entry.full_forms.is_empty());
}

#[test]
fn view_restricts_entry_properties() {
    let conn = imported_db();
    let repo = SqliteDictionaryRepository::new(&conn);
    let band = lexeme_id_of(&conn, "band");

    let grammar = repo.get_entry(band, Some(2)).unwrap().unwrap();
    let values = grammar
        .properties
        .iter()
        .map(|property| property.value.as_str())
        .collect::<Vec<_>>();
    assert_eq!(values, ["noun", "bands"]);

    let err = repo.get_entry(band, Some(9)).unwrap_err();
    assert!(matches!(err, RepoError::UnknownView(9)));
}

#[test]
fn missing_entry_is_none() {
    let conn = imported_db();
    assert!(SqliteDictionaryRepository::new(&conn)
        .get_entry(999, None)
        .unwrap()
        .is_none());
}

#[test]
fn lookups_list_dictionary_metadata() {
    let conn = imported_db();
    let repo = SqliteDictionaryRepository::new(&conn);

    let found = repo.find_by_word(" banana ").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].word, "Banana");

    let categories = repo.list_categories().unwrap();
    assert_eq!(
        categories.iter().map(|c| c.id).collect::<Vec<_>>(),
        [1, 2, 3]
    );
    assert_eq!(categories[0].widget, WidgetType::Chips);

    let views = repo.list_views().unwrap();
    assert_eq!(views[0].name, "Glosses only");
    assert_eq!(views[1].category_ids, [1, 3]);
    assert_eq!(repo.count_lexemes().unwrap(), 7);
}

#[test]
fn bookmarks_toggle_list_and_clear() {
    let conn = imported_db();
    let repo = SqliteBookmarkRepository::new(&conn);
    let apple = lexeme_id_of(&conn, "apple");
    let cherry = lexeme_id_of(&conn, "cherry");

    assert!(repo.toggle_bookmark(apple).unwrap());
    assert!(repo.set_bookmark(cherry, true).unwrap());
    assert!(!repo.set_bookmark(cherry, true).unwrap());
    assert!(repo.is_bookmarked(apple).unwrap());

    let listed = repo
        .list_bookmarks()
        .unwrap()
        .into_iter()
        .map(|bookmark| bookmark.lexeme.word)
        .collect::<Vec<_>>();
    assert_eq!(listed, ["cherry", "apple"]);

    assert!(!repo.toggle_bookmark(apple).unwrap());
    assert_eq!(repo.clear_bookmarks().unwrap(), 1);
    assert!(repo.list_bookmarks().unwrap().is_empty());

    let detail = SqliteDictionaryRepository::new(&conn)
        .get_entry(cherry, None)
        .unwrap()
        .unwrap();
    assert!(!detail.is_bookmarked);
}

#[test]
fn bookmarking_unknown_lexeme_is_not_found() {
    let conn = imported_db();
    let err = SqliteBookmarkRepository::new(&conn)
        .toggle_bookmark(999)
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(999)));
}

#[test]
fn browse_settings_round_trip_through_the_store() {
    let conn = imported_db();
    let repo = SqliteSettingsRepository::new(&conn);
    assert_eq!(repo.load_browse_settings().unwrap(), BrowseSettings::default());

    let mut settings = BrowseSettings::default();
    settings.filter.search = "ignored".to_string();
    settings.filter.search_mode = SearchMode::Contains;
    settings.filter.category_values = vec![CategoryValueFilter {
        category_id: 1,
        value: "noun".to_string(),
    }];
    settings.sort = EntrySort {
        key: SortKey::Category(2),
        descending: true,
    };
    settings.view_id = Some(1);
    settings.page_size = 25;
    repo.save_browse_settings(&settings).unwrap();

    let loaded = repo.load_browse_settings().unwrap();
    assert!(loaded.filter.search.is_empty());
    settings.filter.search.clear();
    assert_eq!(loaded, settings);
}

#[test]
fn corrupt_settings_are_reported() {
    let conn = imported_db();
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES ('browse_settings', '{oops', 0);",
        [],
    )
    .unwrap();

    let err = SqliteSettingsRepository::new(&conn)
        .load_browse_settings()
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
