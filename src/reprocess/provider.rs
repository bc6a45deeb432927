// src/reprocess/provider.rs

//! Associated-file discovery seam
//!
//! The engine does not know how files are associated with a source; that
//! logic lives outside the core. It only needs the current identifiers and
//! plain-text content. [`DirProvider`] is the stock implementation backed
//! by a directory per source.

use crate::error::{Error, Result};
use std::fs;
use std::path::PathBuf;

/// Supplies the current set of files associated with a source
pub trait AssociatedFileProvider: Send + Sync {
    /// Identifiers of the files currently associated with `source_id`.
    /// A source with no associated files is an empty list, not an error.
    fn associated_file_ids(&self, source_id: &str) -> Result<Vec<String>>;

    /// Plain-text content of one associated file.
    /// Fails with [`Error::NotFound`] when the file has vanished.
    fn read_file(&self, source_id: &str, file_id: &str) -> Result<String>;
}

/// Directory-backed provider: files for a source live under
/// `<root>/<source_id>/`, identified by file name
#[derive(Debug, Clone)]
pub struct DirProvider {
    root: PathBuf,
}

impl DirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn source_dir(&self, source_id: &str) -> PathBuf {
        self.root.join(source_id)
    }
}

impl AssociatedFileProvider for DirProvider {
    fn associated_file_ids(&self, source_id: &str) -> Result<Vec<String>> {
        let dir = self.source_dir(source_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read_file(&self, source_id: &str, file_id: &str) -> Result<String> {
        let path = self.source_dir(source_id).join(file_id);
        fs::read_to_string(&path)
            .map_err(|e| Error::NotFound(format!("cannot read {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_source_is_empty() {
        let temp = TempDir::new().unwrap();
        let provider = DirProvider::new(temp.path());
        assert!(provider.associated_file_ids("missing").unwrap().is_empty());
    }

    #[test]
    fn test_ids_sorted_and_files_readable() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("doc-1");
        fs::create_dir(&dir).unwrap();
        for name in ["b.txt", "a.txt"] {
            let mut f = File::create(dir.join(name)).unwrap();
            writeln!(f, "content of {}", name).unwrap();
        }
        let provider = DirProvider::new(temp.path());
        let ids = provider.associated_file_ids("doc-1").unwrap();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert!(provider.read_file("doc-1", "a.txt").unwrap().contains("a.txt"));
    }

    #[test]
    fn test_vanished_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("doc-1")).unwrap();
        let provider = DirProvider::new(temp.path());
        assert!(matches!(
            provider.read_file("doc-1", "gone.txt"),
            Err(Error::NotFound(_))
        ));
    }
}
