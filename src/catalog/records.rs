// src/catalog/records.rs

//! Durable record types and content helpers for the version catalog.
//!
//! Every persisted line is one [`LogRecord`], a self-describing tagged JSON
//! object. Extraction records are immutable once written; the only field
//! that ever changes on rewrite is the `active` status flag.

use crate::fingerprint::{Configuration, Fingerprint};
use crate::reprocess::{IncrementalUpdate, ProcessingVersion, ReprocessingTrigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Metadata for one producer run against one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Unique record id
    pub id: String,

    /// Producer name (engine + profile, as the caller names it)
    pub producer: String,

    /// Source document this extraction belongs to
    pub source_id: String,

    /// The configuration the producer ran under
    pub configuration: Configuration,

    /// Fingerprint of `configuration`
    pub fingerprint: Fingerprint,

    /// Backing file holding the extracted text
    pub file_path: PathBuf,

    /// SHA-256 of the backing file's bytes
    pub checksum: String,

    /// Blocks found in the backing file
    pub block_count: usize,

    /// 1-based, strictly increasing within (producer, source, fingerprint)
    pub version_number: u32,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub notes: Option<String>,

    /// Status flag; flipping it rewrites the log, scoring inputs never change
    #[serde(default = "default_active")]
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ExtractionRecord {
    /// The lineage this record belongs to
    pub fn lineage_key(&self) -> (&str, &str, &Fingerprint) {
        (&self.producer, &self.source_id, &self.fingerprint)
    }

    pub fn matches_source(&self, producer: &str, source_id: &str) -> bool {
        self.producer == producer && self.source_id == source_id
    }
}

/// One line of the durable catalog log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    Extraction(ExtractionRecord),
    ProcessingVersion(ProcessingVersion),
    Trigger(ReprocessingTrigger),
    IncrementalUpdate(IncrementalUpdate),
}

/// Per-fingerprint rollup inside a [`CatalogSummary`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintSummary {
    pub count: usize,
    pub latest_version: u32,
    pub latest_timestamp: DateTime<Utc>,
}

/// Summary of all records for one (producer, source) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub total: usize,
    pub distinct_fingerprints: usize,
    pub per_fingerprint: std::collections::BTreeMap<String, FingerprintSummary>,
}

/// SHA-256 of raw bytes, hex encoded
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Split extracted text into blocks on blank-line boundaries.
///
/// A block is a maximal run of non-blank lines; leading/trailing whitespace
/// on the block is trimmed. Text with no blank lines is a single block;
/// blank-only text has none.
pub fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current).trim_end().to_string());
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.trim_end().to_string());
    }
    blocks
}

/// Number of blocks in extracted text
pub fn count_blocks(text: &str) -> usize {
    split_blocks(text).len()
}
