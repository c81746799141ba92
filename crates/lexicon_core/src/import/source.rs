//! File access over directory and ZIP dictionary sources.

use crate::import::{ImportResult, ImportSource};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::PathBuf;
use zip::ZipArchive;

/// Named-file lookup over one dictionary source.
pub(crate) trait SourceFiles {
    /// Returns file bytes, or `None` when the source has no such file.
    fn read(&mut self, name: &str) -> ImportResult<Option<Vec<u8>>>;
}

pub(crate) fn open(source: &ImportSource) -> ImportResult<Box<dyn SourceFiles + '_>> {
    match source {
        ImportSource::Directory(path) => Ok(Box::new(DirectoryFiles { root: path.clone() })),
        ImportSource::ZipFile(path) => {
            let archive = ZipArchive::new(File::open(path)?)?;
            Ok(Box::new(ZipFiles { archive }))
        }
        ImportSource::ZipBytes { bytes, .. } => {
            let archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
            Ok(Box::new(ZipFiles { archive }))
        }
    }
}

struct DirectoryFiles {
    root: PathBuf,
}

impl SourceFiles for DirectoryFiles {
    fn read(&mut self, name: &str) -> ImportResult<Option<Vec<u8>>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }
}

struct ZipFiles<R> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> SourceFiles for ZipFiles<R> {
    fn read(&mut self, name: &str) -> ImportResult<Option<Vec<u8>>> {
        // Archives built by zipping a folder nest files one level down.
        let nested_suffix = format!("/{name}");
        let Some(entry_name) = self
            .archive
            .file_names()
            .filter(|entry| !entry.starts_with("__MACOSX/"))
            .find(|entry| *entry == name || entry.ends_with(&nested_suffix))
            .map(str::to_string)
        else {
            return Ok(None);
        };

        let mut file = self.archive.by_name(&entry_name)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}
