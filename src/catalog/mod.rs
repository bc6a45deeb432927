// src/catalog/mod.rs

//! Durable version catalog for extraction records and processing versions
//!
//! One catalog owns one directory holding a single JSONL log
//! (`catalog.log`). Registration appends a line; prune and status flips
//! rewrite the whole log. The rewrite is a documented O(n) cost — callers
//! that need segmented or indexed storage are building an extension, not
//! using a default.
//!
//! The catalog handle is explicit: callers open it, hold it, and call
//! [`VersionCatalog::refresh`] when another writer may have touched the
//! log. There is no process-wide cache. The append-then-rewrite model is
//! not safe for concurrent writers; serialize register/prune/status calls
//! per catalog externally.

mod records;

pub use records::{
    CatalogSummary, ExtractionRecord, FingerprintSummary, LogRecord, count_blocks, sha256_hex,
    split_blocks,
};

use crate::error::{Error, Result};
use crate::fingerprint::{self, Configuration, Fingerprint, ValueDiff};
use crate::reprocess::{IncrementalUpdate, ProcessingVersion, ReprocessingTrigger};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the durable log inside a catalog directory
const LOG_FILE: &str = "catalog.log";

/// Caller-held handle to one durable catalog
#[derive(Debug)]
pub struct VersionCatalog {
    root: PathBuf,
    log_path: PathBuf,
    extractions: Vec<ExtractionRecord>,
    versions: Vec<ProcessingVersion>,
    triggers: Vec<ReprocessingTrigger>,
    updates: Vec<IncrementalUpdate>,
}

impl VersionCatalog {
    /// Open (or create) the catalog rooted at `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut catalog = Self {
            root: dir.to_path_buf(),
            log_path: dir.join(LOG_FILE),
            extractions: Vec::new(),
            versions: Vec::new(),
            triggers: Vec::new(),
            updates: Vec::new(),
        };
        if catalog.log_path.exists() {
            catalog.load()?;
        }
        Ok(catalog)
    }

    /// Catalog directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-read the durable log, discarding the in-memory view
    pub fn refresh(&mut self) -> Result<()> {
        self.extractions.clear();
        self.versions.clear();
        self.triggers.clear();
        self.updates.clear();
        if self.log_path.exists() {
            self.load()?;
        }
        Ok(())
    }

    /// Load all records from the log.
    ///
    /// Corrupt lines are skipped with a warning; a duplicate version number
    /// within one lineage aborts with [`Error::Conflict`].
    fn load(&mut self) -> Result<()> {
        let file = File::open(&self.log_path)?;
        let reader = BufReader::new(file);
        let mut seen_versions: HashSet<(String, String, String, u32)> = HashSet::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LogRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        "skipping corrupt catalog line {} in {}: {}",
                        line_num + 1,
                        self.log_path.display(),
                        e
                    );
                    continue;
                }
            };
            match record {
                LogRecord::Extraction(r) => {
                    let key = (
                        r.producer.clone(),
                        r.source_id.clone(),
                        r.fingerprint.to_string(),
                        r.version_number,
                    );
                    if !seen_versions.insert(key) {
                        return Err(Error::Conflict(format!(
                            "duplicate version {} for producer '{}', source '{}', fingerprint {}",
                            r.version_number, r.producer, r.source_id, r.fingerprint
                        )));
                    }
                    self.extractions.push(r);
                }
                LogRecord::ProcessingVersion(v) => self.versions.push(v),
                LogRecord::Trigger(t) => self.triggers.push(t),
                LogRecord::IncrementalUpdate(u) => self.updates.push(u),
            }
        }
        debug!(
            "loaded catalog {}: {} extractions, {} versions",
            self.log_path.display(),
            self.extractions.len(),
            self.versions.len()
        );
        Ok(())
    }

    /// Append one record to the durable log
    fn append(&self, record: &LogRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Rewrite the whole durable log from the in-memory view.
    ///
    /// Used by prune and status flips. Writes to a temp file first, then
    /// renames over the log so a crash never leaves a half-written log.
    fn rewrite(&self) -> Result<()> {
        let tmp_path = self.log_path.with_extension("log.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            for r in &self.extractions {
                writeln!(file, "{}", serde_json::to_string(&LogRecord::Extraction(r.clone()))?)?;
            }
            for v in &self.versions {
                writeln!(
                    file,
                    "{}",
                    serde_json::to_string(&LogRecord::ProcessingVersion(v.clone()))?
                )?;
            }
            for t in &self.triggers {
                writeln!(file, "{}", serde_json::to_string(&LogRecord::Trigger(t.clone()))?)?;
            }
            for u in &self.updates {
                writeln!(
                    file,
                    "{}",
                    serde_json::to_string(&LogRecord::IncrementalUpdate(u.clone()))?
                )?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.log_path)?;
        info!("rewrote catalog log {} ({} extractions)", self.log_path.display(), self.extractions.len());
        Ok(())
    }

    /// Register a new extraction output.
    ///
    /// Computes the configuration fingerprint, the file checksum and block
    /// count, and the next version number in the (producer, source,
    /// fingerprint) lineage. Fails with [`Error::NotFound`] when the file
    /// cannot be read.
    pub fn register(
        &mut self,
        file_path: &Path,
        producer: &str,
        configuration: Configuration,
        source_id: &str,
        tags: Vec<String>,
        notes: Option<String>,
    ) -> Result<ExtractionRecord> {
        let fp = fingerprint::fingerprint(&configuration)?;
        let bytes = fs::read(file_path).map_err(|e| {
            Error::NotFound(format!("cannot read {}: {}", file_path.display(), e))
        })?;
        let text = String::from_utf8_lossy(&bytes);

        let version_number = 1 + self
            .extractions
            .iter()
            .filter(|r| r.matches_source(producer, source_id) && r.fingerprint == fp)
            .map(|r| r.version_number)
            .max()
            .unwrap_or(0);

        let record = ExtractionRecord {
            id: Uuid::new_v4().to_string(),
            producer: producer.to_string(),
            source_id: source_id.to_string(),
            configuration,
            fingerprint: fp,
            file_path: file_path.to_path_buf(),
            checksum: sha256_hex(&bytes),
            block_count: count_blocks(&text),
            version_number,
            tags,
            notes,
            active: true,
            created_at: Utc::now(),
        };
        self.append(&LogRecord::Extraction(record.clone()))?;
        info!(
            "registered {} v{} for source '{}' (fingerprint {})",
            record.producer, record.version_number, record.source_id, record.fingerprint
        );
        self.extractions.push(record.clone());
        Ok(record)
    }

    /// All records for a producer and source, regardless of fingerprint,
    /// oldest first
    pub fn history(&self, producer: &str, source_id: &str) -> Vec<&ExtractionRecord> {
        let mut records: Vec<&ExtractionRecord> = self
            .extractions
            .iter()
            .filter(|r| r.matches_source(producer, source_id))
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    /// Records for one lineage, ordered by version number
    pub fn by_configuration(
        &self,
        producer: &str,
        source_id: &str,
        fp: &Fingerprint,
    ) -> Vec<&ExtractionRecord> {
        let mut records: Vec<&ExtractionRecord> = self
            .extractions
            .iter()
            .filter(|r| r.matches_source(producer, source_id) && &r.fingerprint == fp)
            .collect();
        records.sort_by_key(|r| r.version_number);
        records
    }

    /// The configuration stored with a fingerprint's first record
    pub fn configuration_for(&self, fp: &Fingerprint) -> Option<&Configuration> {
        self.extractions
            .iter()
            .find(|r| &r.fingerprint == fp)
            .map(|r| &r.configuration)
    }

    /// Diff the configurations stored under two fingerprints
    pub fn compare_configurations(
        &self,
        fp_a: &Fingerprint,
        fp_b: &Fingerprint,
    ) -> Result<BTreeMap<String, ValueDiff>> {
        let a = self
            .configuration_for(fp_a)
            .ok_or_else(|| Error::NotFound(format!("no record with fingerprint {}", fp_a)))?;
        let b = self
            .configuration_for(fp_b)
            .ok_or_else(|| Error::NotFound(format!("no record with fingerprint {}", fp_b)))?;
        Ok(fingerprint::diff(a, b))
    }

    /// Records from the same producer and source whose configuration is at
    /// least `threshold` similar, sorted most similar first
    pub fn find_similar(
        &self,
        record: &ExtractionRecord,
        threshold: f64,
    ) -> Vec<(&ExtractionRecord, f64)> {
        let mut matches: Vec<(&ExtractionRecord, f64)> = self
            .extractions
            .iter()
            .filter(|r| r.id != record.id && r.matches_source(&record.producer, &record.source_id))
            .map(|r| {
                (
                    r,
                    fingerprint::similarity(&record.configuration, &r.configuration),
                )
            })
            .filter(|(_, s)| *s >= threshold)
            .collect();
        matches.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.created_at.cmp(&a.0.created_at)));
        matches
    }

    /// Rollup of all records for a producer and source
    pub fn summary(&self, producer: &str, source_id: &str) -> CatalogSummary {
        let mut per_fingerprint: BTreeMap<String, FingerprintSummary> = BTreeMap::new();
        let mut total = 0;
        for r in self
            .extractions
            .iter()
            .filter(|r| r.matches_source(producer, source_id))
        {
            total += 1;
            per_fingerprint
                .entry(r.fingerprint.to_string())
                .and_modify(|s| {
                    s.count += 1;
                    if r.version_number > s.latest_version {
                        s.latest_version = r.version_number;
                        s.latest_timestamp = r.created_at;
                    }
                })
                .or_insert(FingerprintSummary {
                    count: 1,
                    latest_version: r.version_number,
                    latest_timestamp: r.created_at,
                });
        }
        CatalogSummary {
            total,
            distinct_fingerprints: per_fingerprint.len(),
            per_fingerprint,
        }
    }

    /// Delete the oldest records beyond `keep_per_fingerprint` in each
    /// lineage of this producer+source, along with their backing files.
    ///
    /// The most recent `keep_per_fingerprint` records of every lineage are
    /// always retained. Returns the number of records removed.
    pub fn prune(
        &mut self,
        producer: &str,
        source_id: &str,
        keep_per_fingerprint: usize,
    ) -> Result<usize> {
        let mut by_fp: HashMap<&Fingerprint, Vec<&ExtractionRecord>> = HashMap::new();
        for r in self
            .extractions
            .iter()
            .filter(|r| r.matches_source(producer, source_id))
        {
            by_fp.entry(&r.fingerprint).or_default().push(r);
        }

        let mut remove_ids: HashSet<String> = HashSet::new();
        let mut remove_files: Vec<PathBuf> = Vec::new();
        for group in by_fp.values_mut() {
            group.sort_by_key(|r| r.version_number);
            if group.len() > keep_per_fingerprint {
                for r in &group[..group.len() - keep_per_fingerprint] {
                    remove_ids.insert(r.id.clone());
                    remove_files.push(r.file_path.clone());
                }
            }
        }
        if remove_ids.is_empty() {
            return Ok(0);
        }

        for path in &remove_files {
            if let Err(e) = fs::remove_file(path) {
                warn!("could not delete pruned file {}: {}", path.display(), e);
            }
        }
        let removed = remove_ids.len();
        self.extractions.retain(|r| !remove_ids.contains(&r.id));
        self.rewrite()?;
        info!(
            "pruned {} record(s) for producer '{}', source '{}'",
            removed, producer, source_id
        );
        Ok(removed)
    }

    /// Flip a record's active status. Rewrites the log.
    pub fn set_active(&mut self, record_id: &str, active: bool) -> Result<()> {
        let record = self
            .extractions
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::NotFound(format!("no record with id {}", record_id)))?;
        if record.active == active {
            return Ok(());
        }
        record.active = active;
        self.rewrite()
    }

    /// All extraction records for a source, any producer
    pub fn extractions_for_source(&self, source_id: &str) -> Vec<&ExtractionRecord> {
        self.extractions
            .iter()
            .filter(|r| r.source_id == source_id)
            .collect()
    }

    /// Processing versions for a source, oldest first
    pub fn versions_for(&self, source_id: &str) -> Vec<&ProcessingVersion> {
        self.versions
            .iter()
            .filter(|v| v.source_id == source_id)
            .collect()
    }

    /// The most recently recorded processing version for a source
    pub fn latest_version(&self, source_id: &str) -> Option<&ProcessingVersion> {
        self.versions
            .iter()
            .filter(|v| v.source_id == source_id)
            .max_by_key(|v| v.created_at)
    }

    /// Find a processing version by id
    pub fn version_by_id(&self, id: &str) -> Option<&ProcessingVersion> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Persist a new processing version (append-only)
    pub fn record_version(&mut self, version: ProcessingVersion) -> Result<()> {
        self.append(&LogRecord::ProcessingVersion(version.clone()))?;
        self.versions.push(version);
        Ok(())
    }

    /// Persist a reprocessing trigger audit record (append-only)
    pub fn record_trigger(&mut self, trigger: ReprocessingTrigger) -> Result<()> {
        self.append(&LogRecord::Trigger(trigger.clone()))?;
        self.triggers.push(trigger);
        Ok(())
    }

    /// Persist an incremental-update audit record (append-only)
    pub fn record_incremental(&mut self, update: IncrementalUpdate) -> Result<()> {
        self.append(&LogRecord::IncrementalUpdate(update.clone()))?;
        self.updates.push(update);
        Ok(())
    }

    /// Trigger audit records for a source, oldest first
    pub fn triggers_for(&self, source_id: &str) -> Vec<&ReprocessingTrigger> {
        self.triggers
            .iter()
            .filter(|t| t.source_id == source_id)
            .collect()
    }

    /// Incremental-update audit records for a source, oldest first
    pub fn updates_for(&self, source_id: &str) -> Vec<&IncrementalUpdate> {
        self.updates
            .iter()
            .filter(|u| u.source_id == source_id)
            .collect()
    }
}
