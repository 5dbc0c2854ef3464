//! Request and response bodies for the text-to-speech endpoints.

use serde::{Deserialize, Serialize};

use crate::timing::CharacterAlignment;
use crate::{VoiceConfig, VoiceSettings};

#[derive(Debug, Serialize)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub model_id: &'a str,
    pub voice_settings: &'a VoiceSettings,
}

impl<'a> SpeechRequest<'a> {
    pub fn new(text: &'a str, voice: &'a VoiceConfig) -> Self {
        Self {
            text,
            model_id: &voice.model_id,
            voice_settings: &voice.settings,
        }
    }
}

/// Body of `POST /v1/text-to-speech/{voice_id}/with-timestamps`.
#[derive(Debug, Deserialize)]
pub struct TimestampedSpeech {
    pub audio_base64: String,
    #[serde(default)]
    pub alignment: Option<CharacterAlignment>,
    #[serde(default)]
    pub normalized_alignment: Option<CharacterAlignment>,
}

impl TimestampedSpeech {
    /// Alignment over the original text, falling back to the provider's
    /// normalised text when the original is absent.
    pub fn into_alignment(self) -> Option<CharacterAlignment> {
        self.alignment.or(self.normalized_alignment)
    }
}
