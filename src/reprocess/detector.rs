// src/reprocess/detector.rs

//! Change detection against the latest recorded processing version
//!
//! Detection is cheap and read-only: it fingerprints the current effective
//! configuration, counts the currently associated files, and compares both
//! against the latest [`ProcessingVersion`](super::ProcessingVersion) for
//! the source.
//!
//! File detection is best-effort by design: it is count-based, so a
//! simultaneous add and remove cancels out. Exact new-file candidates are
//! only available when the latest version retained its file list (a
//! FULL_DATA run).

use super::provider::AssociatedFileProvider;
use super::{RecommendedAction, SourceState};
use crate::catalog::VersionCatalog;
use crate::error::Result;
use crate::fingerprint::{self, Configuration, Fingerprint, ValueDiff};
use std::collections::BTreeMap;
use tracing::debug;

/// Configuration keys that change on every run and never affect results
const VOLATILE_KEYS: &[&str] = &["timestamp", "generated_at", "run_id"];

/// Strip volatile keys and fingerprint the remainder.
///
/// Returns the stripped configuration alongside its fingerprint so callers
/// can persist exactly what was hashed.
pub fn effective_fingerprint(config: &Configuration) -> Result<(Configuration, Fingerprint)> {
    let mut effective = config.clone();
    for key in VOLATILE_KEYS {
        effective.remove(*key);
    }
    let fp = fingerprint::fingerprint(&effective)?;
    Ok((effective, fp))
}

/// What changed for a source since its latest processing version
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeReport {
    pub state: SourceState,

    /// The effective configuration's fingerprint diverged
    pub config_changed: bool,

    /// Key-level differences: stored configuration vs. current (empty when
    /// the configuration is unchanged)
    pub config_diff: BTreeMap<String, ValueDiff>,

    /// More files are associated now than the latest version recorded
    pub new_files_detected: bool,

    /// Exact new-file identifiers, when the latest version retained its
    /// file list; `None` means identity is unknown
    pub candidate_new_files: Option<Vec<String>>,

    /// Files currently associated with the source
    pub current_file_count: usize,
}

impl ChangeReport {
    /// The action the detected changes call for.
    ///
    /// Configuration changes invalidate every block's result, so they take
    /// priority over file additions and always force a full rebuild. An
    /// uninitialized source also rebuilds, since nothing exists yet.
    pub fn recommended_action(&self) -> RecommendedAction {
        match self.state {
            SourceState::Uninitialized | SourceState::ConfigChanged => RecommendedAction::RebuildAll,
            SourceState::FilesAdded => RecommendedAction::Incremental,
            SourceState::Stable => RecommendedAction::None,
        }
    }
}

/// Read-only comparison of current state against the catalog
pub struct ChangeDetector<'a> {
    catalog: &'a VersionCatalog,
    provider: &'a dyn AssociatedFileProvider,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(catalog: &'a VersionCatalog, provider: &'a dyn AssociatedFileProvider) -> Self {
        Self { catalog, provider }
    }

    /// Compare the current effective configuration and file set against the
    /// latest processing version for `source_id`
    pub fn detect(&self, source_id: &str, current_config: &Configuration) -> Result<ChangeReport> {
        let (effective, fp) = effective_fingerprint(current_config)?;
        let file_ids = self.provider.associated_file_ids(source_id)?;

        let Some(latest) = self.catalog.latest_version(source_id) else {
            debug!("source '{}' has no processing version yet", source_id);
            return Ok(ChangeReport {
                state: SourceState::Uninitialized,
                config_changed: false,
                config_diff: BTreeMap::new(),
                new_files_detected: false,
                candidate_new_files: None,
                current_file_count: file_ids.len(),
            });
        };

        let config_changed = latest.fingerprint != fp;
        let config_diff = if config_changed {
            fingerprint::diff(&latest.configuration, &effective)
        } else {
            BTreeMap::new()
        };

        // Count-based by design: exact identity needs a retained file list
        let new_files_detected = file_ids.len() > latest.file_count;
        let candidate_new_files = if new_files_detected {
            latest.file_ids.as_ref().map(|known| {
                file_ids
                    .iter()
                    .filter(|id| !known.contains(id))
                    .cloned()
                    .collect()
            })
        } else {
            None
        };

        let state = if config_changed {
            SourceState::ConfigChanged
        } else if new_files_detected {
            SourceState::FilesAdded
        } else {
            SourceState::Stable
        };
        debug!(
            "source '{}': state {}, {} file(s) now vs {} recorded",
            source_id,
            state,
            file_ids.len(),
            latest.file_count
        );

        Ok(ChangeReport {
            state,
            config_changed,
            config_diff,
            new_files_detected,
            candidate_new_files,
            current_file_count: file_ids.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reprocess::SourceState;

    fn report(state: SourceState, config_changed: bool, new_files: bool) -> ChangeReport {
        ChangeReport {
            state,
            config_changed,
            config_diff: BTreeMap::new(),
            new_files_detected: new_files,
            candidate_new_files: None,
            current_file_count: 0,
        }
    }

    #[test]
    fn test_config_change_beats_new_files() {
        let r = report(SourceState::ConfigChanged, true, true);
        assert_eq!(r.recommended_action(), RecommendedAction::RebuildAll);
    }

    #[test]
    fn test_new_files_alone_is_incremental() {
        let r = report(SourceState::FilesAdded, false, true);
        assert_eq!(r.recommended_action(), RecommendedAction::Incremental);
    }

    #[test]
    fn test_stable_is_none() {
        let r = report(SourceState::Stable, false, false);
        assert_eq!(r.recommended_action(), RecommendedAction::None);
    }

    #[test]
    fn test_uninitialized_rebuilds() {
        let r = report(SourceState::Uninitialized, false, false);
        assert_eq!(r.recommended_action(), RecommendedAction::RebuildAll);
    }

    #[test]
    fn test_effective_fingerprint_strips_volatile_keys() {
        let mut a = Configuration::new();
        a.insert("dpi".to_string(), serde_json::json!(300));
        a.insert("timestamp".to_string(), serde_json::json!("2024-01-01T00:00:00Z"));
        let mut b = Configuration::new();
        b.insert("dpi".to_string(), serde_json::json!(300));
        b.insert("run_id".to_string(), serde_json::json!("abc"));

        let (ea, fa) = effective_fingerprint(&a).unwrap();
        let (eb, fb) = effective_fingerprint(&b).unwrap();
        assert_eq!(fa, fb);
        assert!(!ea.contains_key("timestamp"));
        assert!(!eb.contains_key("run_id"));
    }
}
