#![allow(dead_code)]

use lexicon_core::db::open_db_in_memory;
use lexicon_core::{import_dictionary, ImportSource};
use rusqlite::Connection;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CATEGORIES_CSV: &str = "id,name,widget,sort_order
1,Part of speech,chips,1
2,Gloss,text,2
3,Inflection,table,3
";

pub const LEXEMES_CSV: &str = "id,word,base_id
1,apple,
2,Banana,
3,band,
4,bands,3
5,cherry,
6,apples,1
7,bake,
";

pub const PROPERTIES_CSV: &str = "lexeme_id,category_id,value
1,1,noun
1,2,a round fruit
2,1,noun
2,2,a long yellow fruit
3,1,noun
3,2,a group of musicians
3,3,bands
5,1,noun
5,2,a small red fruit
6,1,noun
7,1,verb
7,2,to cook in an oven
";

pub const VIEWS_CSV: &str = "id,name,category_ids
1,Glosses only,2
2,Grammar,1;3
";

pub const VERSION_TXT: &str = "1.0\n";

/// Words of the fixture in default (case-insensitive word) order.
pub const WORDS_BY_WORD: [&str; 7] = [
    "apple", "apples", "bake", "Banana", "band", "bands", "cherry",
];

pub fn fixture_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("categories.csv", CATEGORIES_CSV),
        ("lexemes.csv", LEXEMES_CSV),
        ("properties.csv", PROPERTIES_CSV),
        ("views.csv", VIEWS_CSV),
        ("version.txt", VERSION_TXT),
    ]
}

pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

pub fn fixture_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &fixture_files());
    dir
}

pub fn zip_bytes(prefix: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in files {
        writer
            .start_file(format!("{prefix}{name}"), options)
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// In-memory store with the fixture dictionary imported.
pub fn imported_db() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    let dir = fixture_dir();
    import_dictionary(&mut conn, &ImportSource::Directory(dir.path().to_path_buf())).unwrap();
    conn
}

pub fn lexeme_id_of(conn: &Connection, word: &str) -> i64 {
    conn.query_row("SELECT id FROM lexemes WHERE word = ?1;", [word], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn cached_words(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT l.word
             FROM entry_cache c
             INNER JOIN lexemes l ON l.id = c.lexeme_id
             ORDER BY c.position ASC;",
        )
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}
