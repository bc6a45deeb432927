// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use concord::{Configuration, DirProvider, VersionCatalog};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A workspace holding a catalog directory and a sources directory.
///
/// Keep the TempDir alive to prevent cleanup.
pub struct Workspace {
    pub temp: TempDir,
    pub catalog_dir: PathBuf,
    pub sources_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let catalog_dir = temp.path().join("catalog");
        let sources_dir = temp.path().join("sources");
        fs::create_dir_all(&sources_dir).unwrap();
        Self {
            temp,
            catalog_dir,
            sources_dir,
        }
    }

    pub fn open_catalog(&self) -> VersionCatalog {
        VersionCatalog::open(&self.catalog_dir).unwrap()
    }

    pub fn provider(&self) -> DirProvider {
        DirProvider::new(&self.sources_dir)
    }

    /// Write one associated file for a source; returns its path
    pub fn write_associated(&self, source_id: &str, file_id: &str, text: &str) -> PathBuf {
        let dir = self.sources_dir.join(source_id);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_id);
        fs::write(&path, text).unwrap();
        path
    }

    pub fn remove_associated(&self, source_id: &str, file_id: &str) {
        fs::remove_file(self.sources_dir.join(source_id).join(file_id)).unwrap();
    }

    /// Write a standalone extraction output file (for register calls)
    pub fn write_output(&self, name: &str, text: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }
}

pub fn config(value: serde_json::Value) -> Configuration {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("test configuration must be an object, got {}", other),
    }
}

pub fn assert_log_lines_are_json(catalog_dir: &Path) {
    let log = fs::read_to_string(catalog_dir.join("catalog.log")).unwrap();
    for line in log.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("kind").is_some(), "line missing kind tag: {}", line);
    }
}
