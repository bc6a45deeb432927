// src/lib.rs

//! Concord — consistency scoring and reprocessing version control
//!
//! Concord compares text produced by independent extraction producers (OCR
//! and parsing engines under different configurations) for the same logical
//! document, and decides when those comparisons must be recomputed.
//!
//! # Architecture
//!
//! - Fingerprints: deterministic, order-independent configuration identity
//! - Lineages: per (producer, source, fingerprint) version numbering
//! - Append-only catalog: one self-describing JSON record per line;
//!   mutations rewrite the whole log
//! - Change detection: fingerprint + file-count comparison drives a
//!   rebuild / incremental / no-op decision
//! - Scoring: character, word, and spelling consistency per block, with
//!   override terms exempting domain vocabulary
//!
//! # Caller-facing operations
//!
//! - register an extraction: [`VersionCatalog::register`]
//! - detect reprocessing needs: [`ReprocessingOrchestrator::detect_changes`]
//! - rebuild all blocks: [`ReprocessingOrchestrator::rebuild_all`]
//! - apply an incremental update: [`ReprocessingOrchestrator::incremental`]
//! - refresh consistency stats: [`ReprocessingOrchestrator::update_consistency_only`]

pub mod catalog;
mod error;
pub mod fingerprint;
pub mod metrics;
pub mod normalize;
pub mod reprocess;
pub mod scorer;

pub use catalog::{CatalogSummary, ExtractionRecord, FingerprintSummary, VersionCatalog};
pub use error::{Error, Result};
pub use fingerprint::{Configuration, ConfigurationType, Fingerprint, ValueDiff};
pub use normalize::{NormalizeOptions, Normalizer, TextNormalizer};
pub use reprocess::{
    AssociatedFileProvider, ChangeDetector, ChangeReport, DirProvider, IncrementalUpdate,
    ProcessingMode, ProcessingVersion, RecommendedAction, ReprocessingOrchestrator,
    ReprocessingTrigger, ScoreStatistics, SourceState, StorageMode,
};
pub use scorer::{ConsistencyResult, ConsistencyScorer, OverrideTerms};
