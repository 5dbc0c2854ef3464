//! ElevenLabs text-to-speech engine.
//!
//! Talks to the ElevenLabs REST API with a blocking HTTP client. Plain
//! synthesis returns the encoded audio body as-is; timed synthesis uses the
//! `with-timestamps` endpoint, which returns base64 audio plus a
//! per-character alignment.
//!
//! # Credentials
//!
//! The API key is read from `ELEVENLABS_API_KEY`. A `.env` file in the
//! working directory is loaded first when present.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tutor_audio::{Synthesizer, VoiceConfig, engines::elevenlabs::ElevenLabsEngine};
//!
//! let engine = ElevenLabsEngine::from_env()?;
//! let audio = engine.synthesize("Let's measure the garden.", &VoiceConfig::default())?;
//! std::fs::write("garden.mp3", audio)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## With A Custom Endpoint
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tutor_audio::engines::elevenlabs::{ElevenLabsEngine, ElevenLabsParams};
//!
//! let params = ElevenLabsParams {
//!     base_url: "http://localhost:8080".to_string(),
//!     timeout: Duration::from_secs(10),
//! };
//! let engine = ElevenLabsEngine::with_params("test-key", params)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod engine;

pub use engine::{ElevenLabsEngine, ElevenLabsError, ElevenLabsParams, API_KEY_ENV};
