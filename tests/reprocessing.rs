// tests/reprocessing.rs

//! Change-detection state machine and orchestration workflow tests.

mod common;

use common::{Workspace, config};
use concord::{
    Error, RecommendedAction, ReprocessingOrchestrator, SourceState, StorageMode,
};
use serde_json::json;

const BLOCK_A: &str = "The quick brown fox jumps over the lazy dog.";
const BLOCK_B: &str = "Pack my box with five dozen liquor jugs.";

fn two_block_text(a: &str, b: &str) -> String {
    format!("{}\n\n{}", a, b)
}

#[test]
fn test_uninitialized_source_recommends_rebuild() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", BLOCK_A);

    let orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    let report = orchestrator.detect_changes("doc-1").unwrap();

    assert_eq!(report.state, SourceState::Uninitialized);
    assert!(!report.config_changed);
    assert_eq!(report.current_file_count, 1);
    assert_eq!(report.recommended_action(), RecommendedAction::RebuildAll);
}

#[test]
fn test_rebuild_then_stable() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", &two_block_text(BLOCK_A, BLOCK_B));
    ws.write_associated("doc-1", "t2.txt", &two_block_text(BLOCK_A, BLOCK_B));

    let cfg = config(json!({"dpi": 300, "lang": "eng"}));
    let mut orchestrator = ReprocessingOrchestrator::new(&mut catalog, &provider, cfg);
    let version = orchestrator
        .rebuild_all("doc-1", StorageMode::FullData)
        .unwrap();

    assert_eq!(version.block_count, 2);
    assert_eq!(version.file_count, 2);
    assert!(version.parent_id.is_none());
    assert!(version.skipped_files.is_empty());
    let stats = version.statistics.as_ref().unwrap();
    assert_eq!(stats.mean_character, 1.0);
    let block_results = version.block_results.as_ref().unwrap();
    assert_eq!(block_results.len(), 2);
    assert!(block_results.contains_key("block-0000"));
    assert_eq!(
        version.file_ids.as_deref(),
        Some(&["t1.txt".to_string(), "t2.txt".to_string()][..])
    );

    // The run returned the source to STABLE
    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert_eq!(report.state, SourceState::Stable);
    assert_eq!(report.recommended_action(), RecommendedAction::None);

    // The rebuild left an audit trigger behind
    assert_eq!(catalog.triggers_for("doc-1").len(), 1);
    assert_eq!(catalog.triggers_for("doc-1")[0].action, RecommendedAction::RebuildAll);
}

#[test]
fn test_rebuild_with_zero_inputs() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();

    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    let version = orchestrator
        .rebuild_all("empty-doc", StorageMode::FullData)
        .unwrap();

    assert_eq!(version.block_count, 0);
    assert_eq!(version.file_count, 0);
    let stats = version.statistics.as_ref().unwrap();
    assert_eq!(stats.mean_character, 1.0);
    assert_eq!(stats.stddev_spelling, 0.0);
}

#[test]
fn test_new_file_detected_and_applied_incrementally() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", &two_block_text(BLOCK_A, BLOCK_B));
    ws.write_associated("doc-1", "t2.txt", &two_block_text(BLOCK_A, BLOCK_B));

    let cfg = config(json!({"dpi": 300}));
    let mut orchestrator = ReprocessingOrchestrator::new(&mut catalog, &provider, cfg);
    let base = orchestrator
        .rebuild_all("doc-1", StorageMode::FullData)
        .unwrap();

    // A third producer output appears
    ws.write_associated("doc-1", "t3.txt", &two_block_text(BLOCK_A, "A divergent block."));

    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert_eq!(report.state, SourceState::FilesAdded);
    assert!(report.new_files_detected);
    // FULL_DATA retained the file list, so identity is exact
    assert_eq!(
        report.candidate_new_files.as_deref(),
        Some(&["t3.txt".to_string()][..])
    );
    assert_eq!(report.recommended_action(), RecommendedAction::Incremental);

    let update = orchestrator
        .incremental("doc-1", &["t3.txt".to_string()], None)
        .unwrap();
    assert_eq!(update.blocks_updated, 2);
    assert_eq!(update.base_version_id.as_deref(), Some(base.id.as_str()));
    // Block 0 is unanimous, block 1 diverges
    assert!(update.statistics.mean_character < 1.0);

    // The incremental run returned the source to STABLE
    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert_eq!(report.state, SourceState::Stable);

    // Audit records: one update, and its version links to the base
    let updates = catalog.updates_for("doc-1");
    assert_eq!(updates.len(), 1);
    let new_version = catalog.version_by_id(&updates[0].new_version_id).unwrap();
    assert_eq!(new_version.parent_id.as_deref(), Some(base.id.as_str()));
}

#[test]
fn test_config_change_forces_rebuild_even_with_new_files() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", BLOCK_A);

    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    orchestrator
        .rebuild_all("doc-1", StorageMode::FullData)
        .unwrap();

    // Both kinds of change at once
    ws.write_associated("doc-1", "t2.txt", BLOCK_A);
    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 600})));

    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert_eq!(report.state, SourceState::ConfigChanged);
    assert!(report.config_changed);
    assert!(report.new_files_detected);
    assert_eq!(report.recommended_action(), RecommendedAction::RebuildAll);
    assert_eq!(report.config_diff["dpi"].a, Some(json!(300)));
    assert_eq!(report.config_diff["dpi"].b, Some(json!(600)));

    // Incremental is refused outright
    let err = orchestrator
        .incremental("doc-1", &["t2.txt".to_string()], None)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The rebuild records the new fingerprint and returns to STABLE
    let version = orchestrator
        .rebuild_all("doc-1", StorageMode::FullData)
        .unwrap();
    assert!(version.parent_id.is_some());
    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert_eq!(report.state, SourceState::Stable);
}

#[test]
fn test_volatile_keys_do_not_trigger_rebuild() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", BLOCK_A);

    let mut orchestrator = ReprocessingOrchestrator::new(
        &mut catalog,
        &provider,
        config(json!({"dpi": 300, "timestamp": "2024-01-01T00:00:00Z"})),
    );
    orchestrator
        .rebuild_all("doc-1", StorageMode::StatsOnly)
        .unwrap();

    let orchestrator = ReprocessingOrchestrator::new(
        &mut catalog,
        &provider,
        config(json!({"dpi": 300, "timestamp": "2025-06-30T12:00:00Z", "run_id": "xyz"})),
    );
    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert_eq!(report.state, SourceState::Stable);
}

#[test]
fn test_stats_only_version_has_no_file_identity() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", BLOCK_A);

    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    let version = orchestrator
        .rebuild_all("doc-1", StorageMode::StatsOnly)
        .unwrap();
    assert!(version.statistics.is_some());
    assert!(version.block_results.is_none());
    assert!(version.file_ids.is_none());

    // New file: detected by count, but identity is unknown
    ws.write_associated("doc-1", "t2.txt", BLOCK_A);
    let report = orchestrator.detect_changes("doc-1").unwrap();
    assert!(report.new_files_detected);
    assert!(report.candidate_new_files.is_none());
}

#[test]
fn test_config_only_version_has_no_statistics() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    ws.write_associated("doc-1", "t1.txt", BLOCK_A);

    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    let version = orchestrator
        .rebuild_all("doc-1", StorageMode::ConfigOnly)
        .unwrap();
    assert!(version.statistics.is_none());
    assert!(version.block_results.is_none());
    assert_eq!(version.configuration["dpi"], json!(300));
}

#[test]
fn test_update_consistency_only_reflects_override_terms() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    let provider = ws.provider();
    // One producer mentions a rare domain term the others miss
    ws.write_associated("doc-1", "t1.txt", "report snark summary");
    ws.write_associated("doc-1", "t2.txt", "report summary");
    ws.write_associated("doc-1", "t3.txt", "report summary");

    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    let before = orchestrator.update_consistency_only("doc-1").unwrap();
    assert!(before.mean_word < 1.0);

    orchestrator.scorer_mut().register_override_term("snark");
    let after = orchestrator.update_consistency_only("doc-1").unwrap();
    assert_eq!(after.mean_word, 1.0);
    assert!(after.mean_spelling > before.mean_spelling);

    // No extraction records were created, only stats-refresh versions
    assert!(catalog.history("tesseract", "doc-1").is_empty());
    assert_eq!(catalog.versions_for("doc-1").len(), 2);
}

#[test]
fn test_vanished_file_skipped_and_recorded() {
    let ws = Workspace::new();
    let mut catalog = ws.open_catalog();
    ws.write_associated("doc-1", "t1.txt", BLOCK_A);
    ws.write_associated("doc-1", "t2.txt", BLOCK_A);

    // Provider that lists both files but can only read one
    struct FlakyProvider {
        inner: concord::DirProvider,
    }
    impl concord::AssociatedFileProvider for FlakyProvider {
        fn associated_file_ids(&self, source_id: &str) -> concord::Result<Vec<String>> {
            self.inner.associated_file_ids(source_id)
        }
        fn read_file(&self, source_id: &str, file_id: &str) -> concord::Result<String> {
            if file_id == "t2.txt" {
                return Err(concord::Error::NotFound("gone".to_string()));
            }
            self.inner.read_file(source_id, file_id)
        }
    }
    let provider = FlakyProvider {
        inner: ws.provider(),
    };

    let mut orchestrator =
        ReprocessingOrchestrator::new(&mut catalog, &provider, config(json!({"dpi": 300})));
    let version = orchestrator
        .rebuild_all("doc-1", StorageMode::FullData)
        .unwrap();

    assert_eq!(version.file_count, 1);
    assert_eq!(version.skipped_files, vec!["t2.txt"]);
    assert_eq!(version.block_count, 1);
}
