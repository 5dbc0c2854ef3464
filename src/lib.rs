//! # tutor-audio
//!
//! Turns the tutor lines embedded in lesson source files into a
//! content-addressed set of synthesized speech files, each with sentence
//! timing for highlighting, and keeps that set in sync as the lessons change.
//!
//! ## Features
//!
//! - **Template expansion**: `{placeholder}` lines expand over declared value sets
//! - **Incremental sync**: unchanged lines are skipped, stale audio is removed
//! - **Sentence timing**: character alignment is folded into word and sentence spans
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tutor-audio = { version = "2026.10", features = ["elevenlabs"] }
//! ```
//!
//! ```ignore
//! use tutor_audio::engines::elevenlabs::ElevenLabsEngine;
//! use tutor_audio::pipeline::{Pipeline, RunConfigBuilder};
//!
//! let engine = ElevenLabsEngine::from_env()?;
//! let config = RunConfigBuilder::default()
//!     .corpus_root("src")
//!     .audio_dir("public/audio")
//!     .build()?;
//!
//! let summary = Pipeline::new(config, engine).run()?;
//! println!("{summary}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! public/audio/
//! ├── tutor_<hash>.mp3        # one file per concrete line
//! ├── audio_mapping.json      # line text -> audio filename
//! └── timing/
//!     ├── tutor_<hash>.json   # sentence timing for one line
//!     └── index.json          # artifact key -> timing file
//! ```

pub mod cache;
pub mod corpus;
pub mod engines;
pub mod error;
pub mod key;
pub mod manifest;
pub mod pipeline;
pub mod template;
pub mod timing;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::{Error, Result};
pub use timing::CharacterAlignment;

/// Voice tuning sent with every synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Which voice to synthesize with, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Provider voice id (default: the "Hope" premade voice).
    pub voice_id: String,
    pub model_id: String,
    /// Provider output format, e.g. `mp3_44100_128`.
    pub output_format: String,
    pub settings: VoiceSettings,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: "tnSpp4vdxKPjI9w0GnoV".to_string(),
            model_id: "eleven_flash_v2_5".to_string(),
            output_format: "mp3_44100_128".to_string(),
            settings: VoiceSettings::default(),
        }
    }
}

/// Encoded audio plus the per-character timing of the spoken text.
#[derive(Debug, Clone)]
pub struct TimedAudio {
    pub audio: Vec<u8>,
    pub alignment: CharacterAlignment,
}

/// Common interface for text-to-speech providers.
///
/// Implementations take `&self` so one engine can serve several workers.
pub trait Synthesizer {
    /// Synthesize `text` into encoded audio bytes.
    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>>;

    /// Synthesize `text` and report character timing.
    ///
    /// The default implementation reports that timing is unsupported, which
    /// makes callers fall back to [`Synthesizer::synthesize`].
    fn synthesize_with_timing(&self, _text: &str, _voice: &VoiceConfig) -> Result<TimedAudio> {
        Err(Error::Alignment(
            "engine does not report character timing".to_string(),
        ))
    }

    /// Synthesize `text` and write the audio to `path`.
    ///
    /// Default implementation calls `synthesize()` then writes atomically.
    fn synthesize_to_file(&self, text: &str, voice: &VoiceConfig, path: &Path) -> Result<()> {
        let audio = self.synthesize(text, voice)?;
        manifest::write_atomic(path, &audio)
    }
}

impl<T: Synthesizer + ?Sized> Synthesizer for &T {
    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>> {
        (**self).synthesize(text, voice)
    }

    fn synthesize_with_timing(&self, text: &str, voice: &VoiceConfig) -> Result<TimedAudio> {
        (**self).synthesize_with_timing(text, voice)
    }
}
