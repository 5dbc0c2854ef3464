//! Speech synthesis engines.
//!
//! This module contains implementations of [`Synthesizer`](crate::Synthesizer).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `elevenlabs` - ElevenLabs HTTP API (API key required)

#[cfg(feature = "elevenlabs")]
pub mod elevenlabs;
