//! CSV decoding and cross-file validation of dictionary sources.
//!
//! # Invariants
//! - Ids are unique per file.
//! - Every `base_id`, property `lexeme_id`/`category_id` and view category
//!   resolves inside the same source.
//! - Errors carry the file name and the 1-based line of the offending row.

use crate::import::source::SourceFiles;
use crate::import::{
    ImportError, ImportResult, CATEGORIES_FILE, LEXEMES_FILE, PROPERTIES_FILE, VERSION_FILE,
    VIEWS_FILE,
};
use crate::model::lexeme::{
    Category, CategoryId, DictionaryView, Lexeme, LexemeId, Property, ViewId, WidgetType,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;

/// One decoded record and the file line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub line: u64,
    pub record: T,
}

/// Fully decoded and validated dictionary source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryData {
    pub version: Option<String>,
    pub categories: Vec<Sourced<Category>>,
    pub lexemes: Vec<Sourced<Lexeme>>,
    pub properties: Vec<Sourced<Property>>,
    pub views: Vec<Sourced<DictionaryView>>,
}

#[derive(Debug, Deserialize)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    widget: String,
    #[serde(default)]
    sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LexemeRow {
    id: LexemeId,
    word: String,
    #[serde(default)]
    base_id: Option<LexemeId>,
}

#[derive(Debug, Deserialize)]
struct PropertyRow {
    lexeme_id: LexemeId,
    category_id: CategoryId,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    id: ViewId,
    name: String,
    #[serde(default)]
    category_ids: String,
}

pub(crate) fn read_dictionary(files: &mut dyn SourceFiles) -> ImportResult<DictionaryData> {
    let categories = decode_categories(&require(files, CATEGORIES_FILE)?)?;
    let category_ids = unique_ids(CATEGORIES_FILE, &categories, |category| category.id)?;

    let lexemes = decode_lexemes(&require(files, LEXEMES_FILE)?)?;
    let lexeme_ids = unique_ids(LEXEMES_FILE, &lexemes, |lexeme| lexeme.id)?;
    for lexeme in &lexemes {
        if let Some(base_id) = lexeme.record.base_id {
            if !lexeme_ids.contains(&base_id) {
                return Err(invalid(
                    LEXEMES_FILE,
                    lexeme.line,
                    format!("base_id {base_id} does not name a lexeme"),
                ));
            }
        }
    }

    let properties = decode_properties(&require(files, PROPERTIES_FILE)?)?;
    for property in &properties {
        if !lexeme_ids.contains(&property.record.lexeme_id) {
            return Err(invalid(
                PROPERTIES_FILE,
                property.line,
                format!("unknown lexeme_id {}", property.record.lexeme_id),
            ));
        }
        if !category_ids.contains(&property.record.category_id) {
            return Err(invalid(
                PROPERTIES_FILE,
                property.line,
                format!("unknown category_id {}", property.record.category_id),
            ));
        }
    }

    let views = match files.read(VIEWS_FILE)? {
        Some(bytes) => decode_views(&bytes)?,
        None => Vec::new(),
    };
    unique_ids(VIEWS_FILE, &views, |view| view.id)?;
    for view in &views {
        if let Some(missing) = view
            .record
            .category_ids
            .iter()
            .find(|id| !category_ids.contains(id))
        {
            return Err(invalid(
                VIEWS_FILE,
                view.line,
                format!("unknown category id {missing}"),
            ));
        }
    }

    let version = match files.read(VERSION_FILE)? {
        Some(bytes) => {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        None => None,
    };

    Ok(DictionaryData {
        version,
        categories,
        lexemes,
        properties,
        views,
    })
}

fn require(files: &mut dyn SourceFiles, name: &'static str) -> ImportResult<Vec<u8>> {
    files.read(name)?.ok_or(ImportError::MissingFile(name))
}

fn decode_categories(bytes: &[u8]) -> ImportResult<Vec<Sourced<Category>>> {
    decode_rows::<CategoryRow>(CATEGORIES_FILE, bytes)?
        .into_iter()
        .map(|row| {
            let widget = WidgetType::parse(&row.record.widget)
                .map_err(|err| invalid(CATEGORIES_FILE, row.line, err.to_string()))?;
            let category = Category {
                id: row.record.id,
                name: row.record.name,
                widget,
                sort_order: row.record.sort_order.unwrap_or(0),
            };
            category
                .validate()
                .map_err(|err| invalid(CATEGORIES_FILE, row.line, err.to_string()))?;
            Ok(Sourced {
                line: row.line,
                record: category,
            })
        })
        .collect()
}

fn decode_lexemes(bytes: &[u8]) -> ImportResult<Vec<Sourced<Lexeme>>> {
    decode_rows::<LexemeRow>(LEXEMES_FILE, bytes)?
        .into_iter()
        .map(|row| {
            let lexeme = Lexeme::new(row.record.id, row.record.word, row.record.base_id);
            lexeme
                .validate()
                .map_err(|err| invalid(LEXEMES_FILE, row.line, err.to_string()))?;
            Ok(Sourced {
                line: row.line,
                record: lexeme,
            })
        })
        .collect()
}

fn decode_properties(bytes: &[u8]) -> ImportResult<Vec<Sourced<Property>>> {
    decode_rows::<PropertyRow>(PROPERTIES_FILE, bytes)?
        .into_iter()
        .map(|row| {
            if row.record.value.is_empty() {
                return Err(invalid(PROPERTIES_FILE, row.line, "value is blank".to_string()));
            }
            Ok(Sourced {
                line: row.line,
                record: Property {
                    lexeme_id: row.record.lexeme_id,
                    category_id: row.record.category_id,
                    value: row.record.value,
                },
            })
        })
        .collect()
}

fn decode_views(bytes: &[u8]) -> ImportResult<Vec<Sourced<DictionaryView>>> {
    decode_rows::<ViewRow>(VIEWS_FILE, bytes)?
        .into_iter()
        .map(|row| {
            let mut category_ids = Vec::new();
            for part in row.record.category_ids.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let id = part.parse::<CategoryId>().map_err(|_| {
                    invalid(VIEWS_FILE, row.line, format!("invalid category id `{part}`"))
                })?;
                if !category_ids.contains(&id) {
                    category_ids.push(id);
                }
            }
            let view = DictionaryView {
                id: row.record.id,
                name: row.record.name,
                category_ids,
            };
            view.validate()
                .map_err(|err| invalid(VIEWS_FILE, row.line, err.to_string()))?;
            Ok(Sourced {
                line: row.line,
                record: view,
            })
        })
        .collect()
}

fn decode_rows<T: DeserializeOwned>(
    file: &'static str,
    bytes: &[u8],
) -> ImportResult<Vec<Sourced<T>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|source| ImportError::Csv { file, source })?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| ImportError::Csv { file, source })?;
        let line = record.position().map_or(0, |position| position.line());
        let decoded = record
            .deserialize::<T>(Some(&headers))
            .map_err(|source| ImportError::Csv { file, source })?;
        rows.push(Sourced {
            line,
            record: decoded,
        });
    }
    Ok(rows)
}

fn unique_ids<T>(
    file: &'static str,
    rows: &[Sourced<T>],
    id_of: impl Fn(&T) -> i64,
) -> ImportResult<HashSet<i64>> {
    let mut ids = HashSet::with_capacity(rows.len());
    for row in rows {
        let id = id_of(&row.record);
        if !ids.insert(id) {
            return Err(invalid(file, row.line, format!("duplicate id {id}")));
        }
    }
    Ok(ids)
}

fn invalid(file: &'static str, line: u64, message: String) -> ImportError {
    ImportError::Validation {
        file,
        line,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::{read_dictionary, SourceFiles};
    use crate::import::{ImportError, ImportResult};
    use std::collections::HashMap;

    struct MemoryFiles(HashMap<&'static str, &'static str>);

    impl SourceFiles for MemoryFiles {
        fn read(&mut self, name: &str) -> ImportResult<Option<Vec<u8>>> {
            Ok(self.0.get(name).map(|text| text.as_bytes().to_vec()))
        }
    }

    fn files(entries: &[(&'static str, &'static str)]) -> MemoryFiles {
        MemoryFiles(entries.iter().copied().collect())
    }

    #[test]
    fn decodes_minimal_source_with_optional_columns() {
        let mut source = files(&[
            ("categories.csv", "id,name,widget\n1,Part of speech,chips\n"),
            ("lexemes.csv", "id,word,base_id\n1,go,\n2,went,1\n"),
            ("properties.csv", "lexeme_id,category_id,value\n1,1,verb\n"),
            ("version.txt", " 2024.1 \n"),
        ]);

        let data = read_dictionary(&mut source).unwrap();
        assert_eq!(data.version.as_deref(), Some("2024.1"));
        assert_eq!(data.categories[0].record.sort_order, 0);
        assert_eq!(data.lexemes[1].record.base_id, Some(1));
        assert_eq!(data.lexemes[1].line, 3);
        assert!(data.views.is_empty());
    }

    #[test]
    fn dangling_base_id_reports_file_and_line() {
        let mut source = files(&[
            ("categories.csv", "id,name,widget\n"),
            ("lexemes.csv", "id,word,base_id\n1,go,\n2,went,9\n"),
            ("properties.csv", "lexeme_id,category_id,value\n"),
        ]);

        let err = read_dictionary(&mut source).unwrap_err();
        match err {
            ImportError::Validation { file, line, message } => {
                assert_eq!(file, "lexemes.csv");
                assert_eq!(line, 3);
                assert!(message.contains("base_id 9"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_required_file_is_reported() {
        let mut source = files(&[("categories.csv", "id,name,widget\n")]);
        let err = read_dictionary(&mut source).unwrap_err();
        assert!(matches!(err, ImportError::MissingFile("lexemes.csv")));
    }

    #[test]
    fn view_with_unknown_category_is_rejected() {
        let mut source = files(&[
            ("categories.csv", "id,name,widget\n1,Gloss,text\n"),
            ("lexemes.csv", "id,word,base_id\n"),
            ("properties.csv", "lexeme_id,category_id,value\n"),
            ("views.csv", "id,name,category_ids\n1,Short,1;4\n"),
        ]);
        let err = read_dictionary(&mut source).unwrap_err();
        assert!(err.to_string().contains("views.csv:2"));
    }
}
