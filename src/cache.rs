//! Diffing the desired state against the audio cache on disk.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::corpus::DesiredState;
use crate::error::Result;

/// Extension of synthesized artifacts.
pub const AUDIO_EXTENSION: &str = "mp3";
/// Text-to-filename manifest, relative to the audio dir.
pub const MANIFEST_FILE: &str = "audio_mapping.json";
/// Timing subdirectory, relative to the audio dir.
pub const TIMING_DIR: &str = "timing";
/// Timing index, relative to the timing dir.
pub const TIMING_INDEX_FILE: &str = "index.json";

/// Paths of everything stored under one audio directory.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    audio_dir: PathBuf,
}

impl CacheLayout {
    pub fn new(audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn audio_filename(key: &str) -> String {
        format!("{key}.{AUDIO_EXTENSION}")
    }

    pub fn audio_path(&self, key: &str) -> PathBuf {
        self.audio_dir.join(Self::audio_filename(key))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.audio_dir.join(MANIFEST_FILE)
    }

    pub fn timing_dir(&self) -> PathBuf {
        self.audio_dir.join(TIMING_DIR)
    }

    /// Timing file reference as stored in the timing index.
    pub fn timing_reference(key: &str) -> String {
        format!("{TIMING_DIR}/{key}.json")
    }

    pub fn timing_path(&self, key: &str) -> PathBuf {
        self.audio_dir.join(Self::timing_reference(key))
    }

    pub fn timing_index_path(&self) -> PathBuf {
        self.timing_dir().join(TIMING_INDEX_FILE)
    }
}

/// Text-to-filename mapping recorded by the last successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheManifest {
    entries: IndexMap<String, String>,
}

impl CacheManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the manifest at `path`.
    ///
    /// A missing or malformed manifest loads as empty, which forces a full
    /// regeneration instead of failing the run.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::new(),
            Err(err) => {
                log::warn!("Cannot read manifest {}: {err}; treating as empty", path.display());
                return Self::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(err) => {
                log::warn!("Malformed manifest {}: {err}; treating as empty", path.display());
                Self::new()
            }
        }
    }

    pub fn insert(&mut self, text: impl Into<String>, filename: impl Into<String>) {
        self.entries.insert(text.into(), filename.into());
    }

    pub fn filename_for(&self, text: &str) -> Option<&str> {
        self.entries.get(text).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, f)| (t.as_str(), f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Audio files actually present in the audio directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalArtifactSet {
    files: BTreeSet<String>,
}

impl PhysicalArtifactSet {
    /// Collect every `*.mp3` directly under `audio_dir`. A missing directory
    /// is an empty set.
    pub fn scan(audio_dir: &Path) -> Result<Self> {
        let mut files = BTreeSet::new();
        let entries = match std::fs::read_dir(audio_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(AUDIO_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.insert(name.to_string());
            }
        }
        Ok(Self { files })
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.contains(filename)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PhysicalArtifactSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// One desired entry: concrete text and its artifact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    pub text: String,
    pub key: String,
}

/// Add/skip/remove decision for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_generate: Vec<PlannedArtifact>,
    pub to_skip: Vec<PlannedArtifact>,
    /// Filenames of stale audio files.
    pub to_remove: Vec<String>,
}

/// Compute the cache decision for `desired`.
///
/// An entry is skipped only when its audio file exists and the manifest
/// already maps the same text to that file; everything else is generated.
/// Every physical file not named by a desired key is stale.
pub fn synchronize(
    desired: &DesiredState,
    manifest: &CacheManifest,
    physical: &PhysicalArtifactSet,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut wanted: HashSet<String> = HashSet::with_capacity(desired.len());

    for (text, key) in desired.iter() {
        let filename = CacheLayout::audio_filename(key);
        let artifact = PlannedArtifact {
            text: text.to_string(),
            key: key.to_string(),
        };
        if physical.contains(&filename) && manifest.filename_for(text) == Some(filename.as_str()) {
            plan.to_skip.push(artifact);
        } else {
            plan.to_generate.push(artifact);
        }
        wanted.insert(filename);
    }

    plan.to_remove = physical
        .files
        .iter()
        .filter(|name| !wanted.contains(*name))
        .cloned()
        .collect();

    plan
}

/// Delete stale audio files and their timing files. Returns the number of
/// audio files removed; individual failures are logged and skipped.
pub fn remove_stale(layout: &CacheLayout, to_remove: &[String]) -> usize {
    let mut removed = 0;
    for filename in to_remove {
        let path = layout.audio_dir().join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Removed stale audio: {filename}");
                removed += 1;
            }
            Err(err) => {
                log::warn!("Failed to remove {}: {err}", path.display());
                continue;
            }
        }

        let Some(stem) = Path::new(filename).file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let timing = layout.timing_path(stem);
        if timing.exists() {
            if let Err(err) = std::fs::remove_file(&timing) {
                log::warn!("Failed to remove {}: {err}", timing.display());
            }
        }
    }
    removed
}
