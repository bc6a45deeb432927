// src/reprocess/orchestrator.rs

//! Executes reprocessing actions and persists their results
//!
//! The orchestrator holds transient in-memory views only; every durable
//! record goes through the catalog. A run builds its whole result in memory
//! and persists once at the end — there is no partial commit, and the only
//! cancellation is dropping the orchestrator before it persists.
//!
//! Blocks have no cross-block dependencies, so per-block scoring fans out
//! over rayon and the results are collected before aggregation.

use super::detector::{ChangeDetector, ChangeReport, effective_fingerprint};
use super::provider::AssociatedFileProvider;
use super::{
    IncrementalUpdate, ProcessingMode, ProcessingVersion, RecommendedAction, ReprocessingTrigger,
    ScoreStatistics, StorageMode,
};
use crate::catalog::{VersionCatalog, split_blocks};
use crate::error::{Error, Result};
use crate::fingerprint::Configuration;
use crate::scorer::{ConsistencyResult, ConsistencyScorer};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};
use uuid::Uuid;

/// One associated file after its text was read and segmented
struct GatheredFile {
    id: String,
    block_count: usize,
}

/// Drives rebuilds, incremental updates, and stats-only refreshes
pub struct ReprocessingOrchestrator<'a> {
    catalog: &'a mut VersionCatalog,
    provider: &'a dyn AssociatedFileProvider,
    scorer: ConsistencyScorer,
    configuration: Configuration,
}

impl<'a> ReprocessingOrchestrator<'a> {
    /// Orchestrator for one catalog, file provider, and current effective
    /// configuration
    pub fn new(
        catalog: &'a mut VersionCatalog,
        provider: &'a dyn AssociatedFileProvider,
        configuration: Configuration,
    ) -> Self {
        Self {
            catalog,
            provider,
            scorer: ConsistencyScorer::new(),
            configuration,
        }
    }

    /// Replace the default scorer (custom normalizer or override terms)
    pub fn with_scorer(mut self, scorer: ConsistencyScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn scorer_mut(&mut self) -> &mut ConsistencyScorer {
        &mut self.scorer
    }

    /// Compare current configuration and file set against the latest
    /// recorded processing version
    pub fn detect_changes(&self, source_id: &str) -> Result<ChangeReport> {
        ChangeDetector::new(self.catalog, self.provider).detect(source_id, &self.configuration)
    }

    /// Rebuild every block's consistency result and persist a new
    /// processing version.
    ///
    /// Zero associated inputs is not an error: the version records zero
    /// blocks and default perfect statistics.
    pub fn rebuild_all(
        &mut self,
        source_id: &str,
        storage_mode: StorageMode,
    ) -> Result<ProcessingVersion> {
        let report = self.detect_changes(source_id)?;
        let (files, blocks, skipped) = self.gather_blocks(source_id)?;
        let results = self.score_blocks(&blocks)?;
        let statistics = ScoreStatistics::from_results(&results);

        let (effective, fp) = effective_fingerprint(&self.configuration)?;
        let version = ProcessingVersion {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            mode: ProcessingMode::Rebuild,
            storage_mode,
            fingerprint: fp,
            configuration: effective,
            parent_id: self.catalog.latest_version(source_id).map(|v| v.id.clone()),
            block_count: results.len(),
            file_count: files.len(),
            statistics: match storage_mode {
                StorageMode::ConfigOnly => None,
                _ => Some(statistics),
            },
            block_results: match storage_mode {
                StorageMode::FullData => Some(index_results(results.iter().enumerate())),
                _ => None,
            },
            file_ids: match storage_mode {
                StorageMode::FullData => Some(files.iter().map(|f| f.id.clone()).collect()),
                _ => None,
            },
            skipped_files: skipped,
            created_at: Utc::now(),
        };

        self.catalog.record_version(version.clone())?;
        self.record_trigger(source_id, &report, RecommendedAction::RebuildAll)?;
        info!(
            "rebuilt source '{}': {} block(s) across {} file(s), storage {}",
            source_id, version.block_count, version.file_count, version.storage_mode
        );
        Ok(version)
    }

    /// Rescore only the blocks touched by `new_files` and persist the delta.
    ///
    /// Refuses to run when the configuration changed — that invalidates
    /// every block, and only a full rebuild is sound.
    pub fn incremental(
        &mut self,
        source_id: &str,
        new_files: &[String],
        base_version_id: Option<&str>,
    ) -> Result<IncrementalUpdate> {
        let report = self.detect_changes(source_id)?;
        if report.config_changed {
            return Err(Error::Validation(format!(
                "configuration changed for source '{}'; incremental update is not sound, rebuild instead",
                source_id
            )));
        }

        let base_id = match base_version_id {
            Some(id) => Some(
                self.catalog
                    .version_by_id(id)
                    .ok_or_else(|| Error::NotFound(format!("no processing version {}", id)))?
                    .id
                    .clone(),
            ),
            None => self.catalog.latest_version(source_id).map(|v| v.id.clone()),
        };
        let storage_mode = base_id
            .as_deref()
            .and_then(|id| self.catalog.version_by_id(id))
            .map(|v| v.storage_mode)
            .unwrap_or(StorageMode::FullData);

        let (files, blocks, skipped) = self.gather_blocks(source_id)?;

        // Blocks touched by a new file are its block positions; untouched
        // blocks keep their existing results
        let mut touched: BTreeSet<usize> = BTreeSet::new();
        for file_id in new_files {
            match files.iter().find(|f| &f.id == file_id) {
                Some(file) => touched.extend(0..file.block_count),
                None => warn!(
                    "new file '{}' for source '{}' is not associated (or vanished); skipping",
                    file_id, source_id
                ),
            }
        }
        let touched: Vec<usize> = touched.into_iter().filter(|i| *i < blocks.len()).collect();

        let scorer = &self.scorer;
        let rescored: Vec<(usize, ConsistencyResult)> = touched
            .par_iter()
            .map(|&i| scorer.score_block(&blocks[i]).map(|r| (i, r)))
            .collect::<Result<_>>()?;
        let results: Vec<ConsistencyResult> = rescored.iter().map(|(_, r)| r.clone()).collect();
        let statistics = ScoreStatistics::from_results(&results);

        let (effective, fp) = effective_fingerprint(&self.configuration)?;
        let version = ProcessingVersion {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            mode: ProcessingMode::Incremental,
            storage_mode,
            fingerprint: fp,
            configuration: effective,
            parent_id: base_id.clone(),
            block_count: rescored.len(),
            file_count: files.len(),
            statistics: Some(statistics.clone()),
            block_results: match storage_mode {
                StorageMode::FullData => {
                    Some(index_results(rescored.iter().map(|(i, r)| (*i, r))))
                }
                _ => None,
            },
            file_ids: match storage_mode {
                StorageMode::FullData => Some(files.iter().map(|f| f.id.clone()).collect()),
                _ => None,
            },
            skipped_files: skipped,
            created_at: Utc::now(),
        };

        let update = IncrementalUpdate {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            base_version_id: base_id,
            new_version_id: version.id.clone(),
            new_files: new_files.to_vec(),
            blocks_updated: rescored.len(),
            statistics,
            created_at: Utc::now(),
        };

        self.catalog.record_version(version)?;
        self.catalog.record_incremental(update.clone())?;
        self.record_trigger(source_id, &report, RecommendedAction::Incremental)?;
        info!(
            "incremental update for source '{}': {} block(s) rescored from {} new file(s)",
            source_id,
            update.blocks_updated,
            update.new_files.len()
        );
        Ok(update)
    }

    /// Recompute consistency for all known blocks without registering any
    /// new extraction — used after override-term changes. Persists a
    /// stats-only refresh version and returns the aggregates.
    pub fn update_consistency_only(&mut self, source_id: &str) -> Result<ScoreStatistics> {
        let (files, blocks, skipped) = self.gather_blocks(source_id)?;
        let results = self.score_blocks(&blocks)?;
        let statistics = ScoreStatistics::from_results(&results);

        let (effective, fp) = effective_fingerprint(&self.configuration)?;
        let version = ProcessingVersion {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            mode: ProcessingMode::StatsRefresh,
            storage_mode: StorageMode::StatsOnly,
            fingerprint: fp,
            configuration: effective,
            parent_id: self.catalog.latest_version(source_id).map(|v| v.id.clone()),
            block_count: results.len(),
            file_count: files.len(),
            statistics: Some(statistics.clone()),
            block_results: None,
            file_ids: None,
            skipped_files: skipped,
            created_at: Utc::now(),
        };
        self.catalog.record_version(version)?;
        info!(
            "stats refresh for source '{}': {} block(s)",
            source_id,
            results.len()
        );
        Ok(statistics)
    }

    /// Read every associated file, segment it, and collect variations per
    /// block position. A file that vanishes mid-run is skipped, recorded,
    /// and never fails the run.
    fn gather_blocks(
        &self,
        source_id: &str,
    ) -> Result<(Vec<GatheredFile>, Vec<Vec<String>>, Vec<String>)> {
        let ids = self.provider.associated_file_ids(source_id)?;
        let mut files = Vec::new();
        let mut blocks: Vec<Vec<String>> = Vec::new();
        let mut skipped = Vec::new();
        for id in ids {
            let text = match self.provider.read_file(source_id, &id) {
                Ok(text) => text,
                Err(e) => {
                    warn!("skipping associated file '{}' for source '{}': {}", id, source_id, e);
                    skipped.push(id);
                    continue;
                }
            };
            let file_blocks = split_blocks(&text);
            if blocks.len() < file_blocks.len() {
                blocks.resize_with(file_blocks.len(), Vec::new);
            }
            for (i, block) in file_blocks.iter().enumerate() {
                blocks[i].push(block.clone());
            }
            files.push(GatheredFile {
                id,
                block_count: file_blocks.len(),
            });
        }
        Ok((files, blocks, skipped))
    }

    /// Score all block positions in parallel
    fn score_blocks(&self, blocks: &[Vec<String>]) -> Result<Vec<ConsistencyResult>> {
        let scorer = &self.scorer;
        blocks
            .par_iter()
            .map(|variations| scorer.score_block(variations))
            .collect()
    }

    fn record_trigger(
        &mut self,
        source_id: &str,
        report: &ChangeReport,
        action: RecommendedAction,
    ) -> Result<()> {
        self.catalog.record_trigger(ReprocessingTrigger {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            config_changed: report.config_changed,
            new_files_detected: report.new_files_detected,
            action,
            detected_at: Utc::now(),
        })
    }
}

/// Stable block keys for per-block result maps
fn index_results<'r>(
    results: impl Iterator<Item = (usize, &'r ConsistencyResult)>,
) -> BTreeMap<String, ConsistencyResult> {
    results
        .map(|(i, r)| (format!("block-{:04}", i), r.clone()))
        .collect()
}
