// src/reprocess/mod.rs

//! Change detection and reprocessing orchestration
//!
//! A source moves through a small state machine:
//!
//! ```text
//! UNINITIALIZED -> STABLE -> CONFIG_CHANGED | FILES_ADDED -> (reprocess) -> STABLE
//! ```
//!
//! - **ChangeDetector** compares the current effective configuration and
//!   associated-file count against the latest recorded [`ProcessingVersion`]
//! - **ReprocessingOrchestrator** executes the recommended action: a full
//!   rebuild, an incremental update over new files, or a stats-only refresh
//!
//! Configuration changes always force a full rebuild; they invalidate every
//! block's result. File additions only touch the blocks the new files
//! contribute to.

mod detector;
mod orchestrator;
mod provider;

pub use detector::{ChangeDetector, ChangeReport, effective_fingerprint};
pub use orchestrator::ReprocessingOrchestrator;
pub use provider::{AssociatedFileProvider, DirProvider};

use crate::fingerprint::{Configuration, Fingerprint};
use crate::scorer::ConsistencyResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

/// Where a source stands relative to its latest recorded version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    /// No ProcessingVersion exists for the source yet
    Uninitialized,
    /// Fingerprint and file count match the latest version
    Stable,
    /// The effective configuration's fingerprint diverged
    ConfigChanged,
    /// More associated files than the latest version recorded
    FilesAdded,
}

/// What the detector recommends doing about a [`ChangeReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    None,
    Incremental,
    RebuildAll,
}

/// Kind of run a [`ProcessingVersion`] snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    Rebuild,
    Incremental,
    StatsRefresh,
}

/// How much detail a [`ProcessingVersion`] retains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Per-block results and the file list are retained
    FullData,
    /// Aggregate statistics plus configuration
    StatsOnly,
    /// Configuration and identity only
    ConfigOnly,
}

/// Mean and standard deviation of the three consistency scores across blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub mean_character: f64,
    pub stddev_character: f64,
    pub mean_word: f64,
    pub stddev_word: f64,
    pub mean_spelling: f64,
    pub stddev_spelling: f64,
}

impl ScoreStatistics {
    /// Default statistics for a run with no blocks
    pub fn perfect() -> Self {
        Self {
            mean_character: 1.0,
            stddev_character: 0.0,
            mean_word: 1.0,
            stddev_word: 0.0,
            mean_spelling: 1.0,
            stddev_spelling: 0.0,
        }
    }

    /// Aggregate statistics over per-block results
    pub fn from_results(results: &[ConsistencyResult]) -> Self {
        if results.is_empty() {
            return Self::perfect();
        }
        let (mean_character, stddev_character) =
            mean_stddev(results.iter().map(|r| r.character_score));
        let (mean_word, stddev_word) = mean_stddev(results.iter().map(|r| r.word_score));
        let (mean_spelling, stddev_spelling) =
            mean_stddev(results.iter().map(|r| r.spelling_score));
        Self {
            mean_character,
            stddev_character,
            mean_word,
            stddev_word,
            mean_spelling,
            stddev_spelling,
        }
    }
}

/// Population mean and standard deviation
fn mean_stddev(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (1.0, 0.0);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, variance.sqrt())
}

/// Immutable snapshot of one reprocessing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingVersion {
    pub id: String,
    pub source_id: String,
    pub mode: ProcessingMode,
    pub storage_mode: StorageMode,

    /// Fingerprint of the effective configuration the run used
    pub fingerprint: Fingerprint,

    /// The effective configuration itself (volatile keys stripped)
    pub configuration: Configuration,

    /// Version this run built on, if any
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Blocks evaluated by this run
    pub block_count: usize,

    /// Associated files seen by this run
    pub file_count: usize,

    /// Aggregates; absent under [`StorageMode::ConfigOnly`]
    #[serde(default)]
    pub statistics: Option<ScoreStatistics>,

    /// Per-block detail; retained only under [`StorageMode::FullData`]
    #[serde(default)]
    pub block_results: Option<BTreeMap<String, ConsistencyResult>>,

    /// File identifiers; retained only under [`StorageMode::FullData`]
    #[serde(default)]
    pub file_ids: Option<Vec<String>>,

    /// Files that vanished mid-run and were skipped
    #[serde(default)]
    pub skipped_files: Vec<String>,

    pub created_at: DateTime<Utc>,
}

/// Append-only audit record of a detected change and the chosen action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprocessingTrigger {
    pub id: String,
    pub source_id: String,
    pub config_changed: bool,
    pub new_files_detected: bool,
    pub action: RecommendedAction,
    pub detected_at: DateTime<Utc>,
}

/// Append-only audit record of an incremental delta that was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalUpdate {
    pub id: String,
    pub source_id: String,

    /// Version the delta was applied on top of
    #[serde(default)]
    pub base_version_id: Option<String>,

    /// The ProcessingVersion this update produced
    pub new_version_id: String,

    /// Files that triggered the update
    pub new_files: Vec<String>,

    /// Blocks that were rescored
    pub blocks_updated: usize,

    /// Aggregates over the rescored blocks
    pub statistics: ScoreStatistics,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_statistics() {
        let stats = ScoreStatistics::perfect();
        assert_eq!(stats.mean_character, 1.0);
        assert_eq!(stats.stddev_word, 0.0);
    }

    #[test]
    fn test_statistics_from_empty_results() {
        assert_eq!(ScoreStatistics::from_results(&[]), ScoreStatistics::perfect());
    }

    #[test]
    fn test_mean_stddev() {
        let (mean, stddev) = mean_stddev([0.5, 1.0].into_iter());
        assert!((mean - 0.75).abs() < 1e-9);
        assert!((stddev - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_mode_string_mapping() {
        assert_eq!(StorageMode::FullData.to_string(), "full_data");
        assert_eq!("stats_only".parse::<StorageMode>().unwrap(), StorageMode::StatsOnly);
        assert_eq!(ProcessingMode::StatsRefresh.to_string(), "stats_refresh");
        assert_eq!(RecommendedAction::RebuildAll.to_string(), "rebuild_all");
        assert_eq!(SourceState::ConfigChanged.to_string(), "config_changed");
    }

    #[test]
    fn test_storage_mode_serde_roundtrip() {
        let json = serde_json::to_string(&StorageMode::ConfigOnly).unwrap();
        assert_eq!(json, "\"config_only\"");
        let back: StorageMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StorageMode::ConfigOnly);
    }
}
