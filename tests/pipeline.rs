use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use tutor_audio::cache::{CacheLayout, CacheManifest};
use tutor_audio::key::derive;
use tutor_audio::manifest::TimingIndex;
use tutor_audio::pipeline::{Pipeline, RunConfig, RunConfigBuilder};
use tutor_audio::timing::TimingRecord;
use tutor_audio::{CharacterAlignment, Error, Result, Synthesizer, TimedAudio, VoiceConfig};

const LESSON: &str = r#"
export const lesson = {
    intro: { tutorText: "Welcome to the farm! Let's measure." },
    hint: { tutorText: "The shape has a perimeter of {currentPerimeter}." },
    broken: { tutorText: "Nice work, {userName}!" },
};
"#;

const EXTRA: &str = r#"
export const extra = { tutorText: "Count the sides\nwith me." };
"#;

/// In-memory engine that records every call.
#[derive(Default)]
struct FakeEngine {
    calls: Mutex<Vec<String>>,
    fail_text: Option<String>,
    no_timing: bool,
}

impl FakeEngine {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Synthesizer for FakeEngine {
    fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail_text.as_deref() == Some(text) {
            return Err(Error::Synthesis("quota exceeded".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }

    fn synthesize_with_timing(&self, text: &str, voice: &VoiceConfig) -> Result<TimedAudio> {
        if self.no_timing {
            return Err(Error::Alignment("not available".to_string()));
        }
        let audio = self.synthesize(text, voice)?;
        let alignment = CharacterAlignment::from_chars(
            text.chars()
                .enumerate()
                .map(|(i, c)| (c, i as f64 * 0.05, (i + 1) as f64 * 0.05)),
        );
        Ok(TimedAudio { audio, alignment })
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/content")).unwrap();
        fs::write(dir.path().join("src/content/01-lesson.js"), LESSON).unwrap();
        fs::write(dir.path().join("src/content/02-extra.js"), EXTRA).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> RunConfig {
        RunConfigBuilder::default()
            .corpus_root(self.root().join("src"))
            .audio_dir(self.root().join("public/audio"))
            .build()
            .unwrap()
    }

    fn layout(&self) -> CacheLayout {
        CacheLayout::new(self.root().join("public/audio"))
    }

    fn manifest(&self) -> CacheManifest {
        CacheManifest::load(&self.layout().manifest_path())
    }
}

// 1 static + 17 perimeters + 1 static; the userName template expands to nothing.
const EXPECTED: usize = 19;

#[test]
fn first_run_generates_everything() {
    let ws = Workspace::new();
    let summary = Pipeline::new(ws.config(), FakeEngine::default()).run().unwrap();

    assert_eq!(summary.generated, EXPECTED);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.timed, EXPECTED);

    let manifest = ws.manifest();
    assert_eq!(manifest.len(), EXPECTED);
    let first = manifest.iter().next().unwrap();
    assert_eq!(first.0, "Welcome to the farm! Let's measure.");
    assert_eq!(
        manifest.filename_for("Count the sides with me."),
        Some(format!("{}.mp3", derive("Count the sides with me.")).as_str())
    );

    let index = TimingIndex::load(&ws.layout().timing_index_path());
    assert_eq!(index.len(), EXPECTED);

    let key = derive("Welcome to the farm! Let's measure.");
    let record: TimingRecord =
        serde_json::from_str(&fs::read_to_string(ws.layout().timing_path(&key)).unwrap()).unwrap();
    let sentences: Vec<_> = record.sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(sentences, vec!["Welcome to the farm!", "Let's measure."]);
}

#[test]
fn second_run_skips_everything() {
    let ws = Workspace::new();
    Pipeline::new(ws.config(), FakeEngine::default()).run().unwrap();
    let before = fs::read_to_string(ws.layout().manifest_path()).unwrap();

    let engine = FakeEngine::default();
    let pipeline = Pipeline::new(ws.config(), engine);
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.skipped, EXPECTED);
    assert_eq!(fs::read_to_string(ws.layout().manifest_path()).unwrap(), before);
}

#[test]
fn deleted_audio_is_regenerated_alone() {
    let ws = Workspace::new();
    Pipeline::new(ws.config(), FakeEngine::default()).run().unwrap();

    let text = "The shape has a perimeter of 12.";
    fs::remove_file(ws.layout().audio_path(&derive(text))).unwrap();

    let pipeline = Pipeline::new(ws.config(), FakeEngine::default());
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.skipped, EXPECTED - 1);
    assert!(ws.layout().audio_path(&derive(text)).exists());
}

#[test]
fn removed_text_is_cleaned_up() {
    let ws = Workspace::new();
    Pipeline::new(ws.config(), FakeEngine::default()).run().unwrap();

    let gone = "Count the sides with me.";
    fs::remove_file(ws.root().join("src/content/02-extra.js")).unwrap();

    let summary = Pipeline::new(ws.config(), FakeEngine::default()).run().unwrap();
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.generated, 0);
    assert!(!ws.layout().audio_path(&derive(gone)).exists());
    assert!(!ws.layout().timing_path(&derive(gone)).exists());
    assert_eq!(ws.manifest().len(), EXPECTED - 1);
    assert!(ws.manifest().filename_for(gone).is_none());
}

#[test]
fn failed_line_is_retried_next_run() {
    let ws = Workspace::new();
    let text = "The shape has a perimeter of 20.";
    let engine = FakeEngine {
        fail_text: Some(text.to_string()),
        ..Default::default()
    };
    let summary = Pipeline::new(ws.config(), engine).run().unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.generated, EXPECTED - 1);
    assert_eq!(summary.failures[0].0, text);
    assert!(ws.manifest().filename_for(text).is_none());

    let engine = FakeEngine::default();
    let pipeline = Pipeline::new(ws.config(), engine);
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.generated, 1);
    assert_eq!(ws.manifest().len(), EXPECTED);
}

#[test]
fn timing_failure_falls_back_to_plain_audio() {
    let ws = Workspace::new();
    let engine = FakeEngine {
        no_timing: true,
        ..Default::default()
    };
    let summary = Pipeline::new(ws.config(), engine).run().unwrap();
    assert_eq!(summary.generated, EXPECTED);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.timed, 0);
    assert!(TimingIndex::load(&ws.layout().timing_index_path()).is_empty());
}

#[test]
fn missing_corpus_has_no_side_effects() {
    let ws = Workspace::new();
    let config = RunConfig {
        corpus_root: ws.root().join("nowhere"),
        ..ws.config()
    };
    let engine = FakeEngine::default();
    let err = Pipeline::new(config, engine).run().unwrap_err();
    assert!(matches!(err, Error::CorpusNotFound(_)));
    assert!(!ws.root().join("public/audio").exists());
}

#[test]
fn corpus_without_tutor_text_fails() {
    let ws = Workspace::new();
    let empty = ws.root().join("empty");
    fs::create_dir_all(&empty).unwrap();
    fs::write(empty.join("app.js"), "console.log('hi');").unwrap();
    let config = RunConfig {
        corpus_root: empty,
        ..ws.config()
    };
    let err = Pipeline::new(config, FakeEngine::default()).run().unwrap_err();
    assert!(matches!(err, Error::NoTemplates(_)));
}

#[test]
fn parallel_workers_produce_the_same_manifest() {
    let sequential = Workspace::new();
    Pipeline::new(sequential.config(), FakeEngine::default()).run().unwrap();

    let parallel = Workspace::new();
    let engine = FakeEngine::default();
    let config = RunConfig {
        workers: 4,
        ..parallel.config()
    };
    let pipeline = Pipeline::new(config, engine);
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.generated, EXPECTED);

    let a: Vec<(String, String)> = sequential
        .manifest()
        .iter()
        .map(|(t, f)| (t.to_string(), f.to_string()))
        .collect();
    let b: Vec<(String, String)> = parallel
        .manifest()
        .iter()
        .map(|(t, f)| (t.to_string(), f.to_string()))
        .collect();
    assert_eq!(a, b);
}

#[test]
fn engine_is_called_once_per_line() {
    let ws = Workspace::new();
    let pipeline = Pipeline::new(ws.config(), FakeEngine::default());
    pipeline.run().unwrap();
    let (_, plan) = pipeline.plan().unwrap();
    assert!(plan.to_generate.is_empty());

    let engine = FakeEngine::default();
    let config = RunConfig {
        audio_dir: ws.root().join("other/audio"),
        ..ws.config()
    };
    Pipeline::new(config, &engine).run().unwrap();
    let calls = engine.calls();
    let unique: HashSet<_> = calls.iter().collect();
    assert_eq!(calls.len(), EXPECTED);
    assert_eq!(unique.len(), EXPECTED);
}
