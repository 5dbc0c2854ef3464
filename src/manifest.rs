//! Persisting the audio manifest and the timing index.
//!
//! All files are written to a temporary sibling and renamed into place, so a
//! reader never sees a half-written manifest.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheLayout, CacheManifest};
use crate::corpus::DesiredState;
use crate::error::Result;
use crate::timing::TimingRecord;

/// Artifact key to timing file reference (`timing/<key>.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimingIndex {
    entries: BTreeMap<String, String>,
}

impl TimingIndex {
    /// Load the index at `path`; missing or malformed files load as empty.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|err| {
            log::warn!("Malformed timing index {}: {err}; starting fresh", path.display());
            Self::default()
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, reference: impl Into<String>) {
        self.entries.insert(key.into(), reference.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write `bytes` to `path` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

/// The manifest for this run: every desired entry except the ones whose
/// synthesis failed, in desired-state order.
pub fn manifest_from_desired(
    desired: &DesiredState,
    failed_keys: &HashSet<String>,
) -> CacheManifest {
    let mut manifest = CacheManifest::new();
    for (text, key) in desired.iter() {
        if failed_keys.contains(key) {
            continue;
        }
        manifest.insert(text, CacheLayout::audio_filename(key));
    }
    manifest
}

/// Replace the audio manifest.
pub fn write_manifest(layout: &CacheLayout, manifest: &CacheManifest) -> Result<()> {
    let path = layout.manifest_path();
    write_json(&path, manifest)?;
    log::info!("Wrote audio mapping ({} entries): {}", manifest.len(), path.display());
    Ok(())
}

/// Write one timing file per record and merge the records into the timing
/// index. Existing index entries are kept; entries for the same key are
/// overwritten. Returns the merged index.
pub fn write_timing_index(
    layout: &CacheLayout,
    records: &BTreeMap<String, TimingRecord>,
) -> Result<TimingIndex> {
    let index_path = layout.timing_index_path();
    let mut index = TimingIndex::load(&index_path);

    for (key, record) in records {
        write_json(&layout.timing_path(key), record)?;
        index.insert(key.as_str(), CacheLayout::timing_reference(key));
    }

    write_json(&index_path, &index)?;
    log::info!(
        "Wrote timing index ({} new, {} total): {}",
        records.len(),
        index.len(),
        index_path.display()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::derive;
    use crate::timing::SentenceSpan;

    fn record(text: &str) -> TimingRecord {
        TimingRecord {
            text: text.to_string(),
            sentences: vec![SentenceSpan {
                text: text.to_string(),
                start: 0.0,
                end: 1.0,
            }],
        }
    }

    #[test]
    fn manifest_excludes_failed_and_keeps_order() {
        let mut desired = DesiredState::new();
        for text in ["C.", "A.", "B."] {
            desired.insert(text.to_string(), derive(text));
        }
        let failed: HashSet<String> = [derive("A.")].into_iter().collect();
        let manifest = manifest_from_desired(&desired, &failed);
        let texts: Vec<_> = manifest.iter().map(|(t, _)| t).collect();
        assert_eq!(texts, vec!["C.", "B."]);
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let mut manifest = CacheManifest::new();
        manifest.insert("Héllo \"there\".", "tutor_abc.mp3");
        write_manifest(&layout, &manifest).unwrap();

        let raw = std::fs::read_to_string(layout.manifest_path()).unwrap();
        assert!(raw.contains("Héllo"));
        assert!(raw.starts_with("{\n  \""));
        assert_eq!(CacheManifest::load(&layout.manifest_path()), manifest);
        assert!(!dir.path().join("audio_mapping.json.tmp").exists());
    }

    #[test]
    fn timing_index_merges_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());

        let first: BTreeMap<_, _> = [("tutor_a".to_string(), record("A."))].into();
        write_timing_index(&layout, &first).unwrap();
        let second: BTreeMap<_, _> = [("tutor_b".to_string(), record("B."))].into();
        let index = write_timing_index(&layout, &second).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("tutor_a"), Some("timing/tutor_a.json"));
        assert_eq!(TimingIndex::load(&layout.timing_index_path()), index);

        let stored: TimingRecord =
            serde_json::from_str(&std::fs::read_to_string(layout.timing_path("tutor_b")).unwrap())
                .unwrap();
        assert_eq!(stored, record("B."));
    }
}
