//! Run orchestration: extract, synchronise, synthesize, time, persist.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use derive_builder::Builder;
use rayon::prelude::*;

use crate::cache::{
    remove_stale, synchronize, CacheLayout, CacheManifest, PhysicalArtifactSet, PlannedArtifact,
    SyncPlan,
};
use crate::corpus::{CorpusExtractor, DesiredState, DEFAULT_FIELD};
use crate::error::{Error, Result};
use crate::key::DEFAULT_KEY_PREFIX;
use crate::manifest::{manifest_from_desired, write_atomic, write_manifest, write_timing_index};
use crate::template::ParameterTable;
use crate::timing::{reconstruct, TimingRecord};
use crate::{Synthesizer, VoiceConfig};

/// Everything one run needs. Built with [`RunConfigBuilder`]; unset fields
/// take the lesson defaults.
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct RunConfig {
    /// Directory (or single file) holding the lesson sources.
    pub corpus_root: PathBuf,
    /// Source file extension, without the dot.
    pub extension: String,
    /// Label of the quoted field holding tutor text.
    pub field: String,
    pub audio_dir: PathBuf,
    pub key_prefix: String,
    pub params: ParameterTable,
    pub voice: VoiceConfig,
    /// Concurrent synthesis calls. `1` runs sequentially.
    pub workers: usize,
    /// Request character timing and write sentence timing files.
    pub timing: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from("src"),
            extension: "js".to_string(),
            field: DEFAULT_FIELD.to_string(),
            audio_dir: PathBuf::from("public/audio"),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            params: ParameterTable::tutor_defaults(),
            voice: VoiceConfig::default(),
            workers: 1,
            timing: true,
        }
    }
}

/// Counts and per-line failures for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
    /// Generated artifacts that also received a timing file.
    pub timed: usize,
    /// `(text, cause)` for each failed line, in desired-state order.
    pub failures: Vec<(String, String)>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generated {}, skipped {}, failed {}, removed {} stale, {} with timing",
            self.generated, self.skipped, self.failed, self.removed, self.timed
        )
    }
}

enum Outcome {
    Generated(Option<TimingRecord>),
    Failed(String),
}

/// Drives a run against one synthesis engine.
pub struct Pipeline<S> {
    config: RunConfig,
    synthesizer: S,
    layout: CacheLayout,
}

impl<S: Synthesizer + Sync> Pipeline<S> {
    pub fn new(config: RunConfig, synthesizer: S) -> Self {
        let layout = CacheLayout::new(&config.audio_dir);
        Self {
            config,
            synthesizer,
            layout,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Build the desired state from the corpus.
    pub fn extract(&self) -> Result<DesiredState> {
        let extractor = CorpusExtractor::new(
            &self.config.field,
            self.config.params.clone(),
            self.config.key_prefix.clone(),
        )?;
        extractor.extract_dir(&self.config.corpus_root, &self.config.extension)
    }

    /// Extract and diff against the cache without touching anything.
    pub fn plan(&self) -> Result<(DesiredState, SyncPlan)> {
        let desired = self.extract()?;
        let manifest = CacheManifest::load(&self.layout.manifest_path());
        let physical = PhysicalArtifactSet::scan(self.layout.audio_dir())?;
        let plan = synchronize(&desired, &manifest, &physical);
        Ok((desired, plan))
    }

    /// Execute a full run.
    ///
    /// Fails only when the corpus is missing or yields no tutor text, or when
    /// the audio directory or manifests cannot be written. Individual lines
    /// that fail to synthesize are counted in the summary.
    pub fn run(&self) -> Result<RunSummary> {
        let (desired, plan) = self.plan()?;
        log::info!(
            "Plan: {} to generate, {} up to date, {} stale",
            plan.to_generate.len(),
            plan.to_skip.len(),
            plan.to_remove.len()
        );

        std::fs::create_dir_all(self.layout.audio_dir())?;

        // Stale removal finishes before any generation starts.
        let removed = remove_stale(&self.layout, &plan.to_remove);

        let outcomes = self.generate_all(&plan.to_generate)?;

        let mut summary = RunSummary {
            skipped: plan.to_skip.len(),
            removed,
            ..RunSummary::default()
        };
        let mut failed_keys = HashSet::new();
        let mut records = BTreeMap::new();

        for (artifact, outcome) in plan.to_generate.iter().zip(outcomes) {
            match outcome {
                Outcome::Generated(timing) => {
                    summary.generated += 1;
                    if let Some(record) = timing {
                        summary.timed += 1;
                        records.insert(artifact.key.clone(), record);
                    }
                }
                Outcome::Failed(cause) => {
                    summary.failed += 1;
                    failed_keys.insert(artifact.key.clone());
                    summary.failures.push((artifact.text.clone(), cause));
                }
            }
        }

        write_manifest(&self.layout, &manifest_from_desired(&desired, &failed_keys))?;
        if self.config.timing {
            write_timing_index(&self.layout, &records)?;
        }

        log::info!("Run complete: {summary}");
        if summary.failed > 0 {
            log::warn!(
                "{} files failed to generate. Check your API key and network connection.",
                summary.failed
            );
        }
        Ok(summary)
    }

    /// Synthesize every planned artifact, returning outcomes in plan order.
    fn generate_all(&self, artifacts: &[PlannedArtifact]) -> Result<Vec<Outcome>> {
        if self.config.workers <= 1 || artifacts.len() <= 1 {
            return Ok(artifacts.iter().map(|a| self.generate_one(a)).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| Error::Config(format!("cannot start synthesis workers: {e}")))?;
        Ok(pool.install(|| artifacts.par_iter().map(|a| self.generate_one(a)).collect()))
    }

    fn generate_one(&self, artifact: &PlannedArtifact) -> Outcome {
        let preview: String = artifact.text.chars().take(50).collect();
        log::info!("Generating {} for: {preview}...", artifact.key);

        match self.synthesize_artifact(artifact) {
            Ok(timing) => {
                log::debug!("Saved {}", self.layout.audio_path(&artifact.key).display());
                Outcome::Generated(timing)
            }
            Err(err) => {
                log::warn!("Error generating {}: {err}", artifact.key);
                Outcome::Failed(err.to_string())
            }
        }
    }

    fn synthesize_artifact(&self, artifact: &PlannedArtifact) -> Result<Option<TimingRecord>> {
        let voice = &self.config.voice;
        let path = self.layout.audio_path(&artifact.key);

        if !self.config.timing {
            self.synthesizer.synthesize_to_file(&artifact.text, voice, &path)?;
            return Ok(None);
        }

        match self.synthesizer.synthesize_with_timing(&artifact.text, voice) {
            Ok(timed) => {
                write_atomic(&path, &timed.audio)?;
                let record = reconstruct(&artifact.text, &timed.alignment);
                if record.is_none() {
                    log::warn!("No usable timing for {}", artifact.key);
                }
                Ok(record)
            }
            Err(err) => {
                log::warn!(
                    "Timed synthesis failed for {} ({err}); retrying without timing",
                    artifact.key
                );
                self.synthesizer.synthesize_to_file(&artifact.text, voice, &path)?;
                Ok(None)
            }
        }
    }
}
