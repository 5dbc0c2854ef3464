use std::time::Duration;

use base64::Engine as _;
use reqwest::blocking::{Client, Response};

use crate::{Error, Result, Synthesizer, TimedAudio, VoiceConfig};

use super::api::{SpeechRequest, TimestampedSpeech};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(thiserror::Error, Debug)]
pub enum ElevenLabsError {
    #[error(
        "ELEVENLABS_API_KEY is not set. Export it or add \
         `ELEVENLABS_API_KEY=your_key_here` to a .env file"
    )]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Invalid base64 audio: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Response carried no character alignment")]
    MissingAlignment,
}

impl From<ElevenLabsError> for Error {
    fn from(err: ElevenLabsError) -> Self {
        match err {
            ElevenLabsError::MissingApiKey => Error::Config(err.to_string()),
            ElevenLabsError::MissingAlignment => Error::Alignment(err.to_string()),
            other => Error::Synthesis(other.to_string()),
        }
    }
}

/// Parameters for configuring the HTTP client.
#[derive(Debug, Clone)]
pub struct ElevenLabsParams {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ElevenLabsParams {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// ElevenLabs text-to-speech engine.
pub struct ElevenLabsEngine {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsEngine {
    /// Create an engine from `ELEVENLABS_API_KEY`, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                log::warn!("Ignoring unreadable .env file: {err}");
            }
        }
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ElevenLabsError::MissingApiKey)?;
        Self::with_params(api_key, ElevenLabsParams::default())
    }

    /// Create an engine with an explicit key and client parameters.
    pub fn with_params(api_key: impl Into<String>, params: ElevenLabsParams) -> Result<Self> {
        let client = Client::builder()
            .timeout(params.timeout)
            .build()
            .map_err(ElevenLabsError::from)?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: params.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn post(
        &self,
        path: &str,
        text: &str,
        voice: &VoiceConfig,
    ) -> std::result::Result<Response, ElevenLabsError> {
        let url = format!("{}/v1/text-to-speech/{}{path}", self.base_url, voice.voice_id);
        log::debug!("POST {url} ({} chars)", text.chars().count());

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .query(&[("output_format", voice.output_format.as_str())])
            .json(&SpeechRequest::new(text, voice))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ElevenLabsError::Status { status, body });
        }
        Ok(response)
    }

    fn fetch_timed(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> std::result::Result<TimedAudio, ElevenLabsError> {
        let speech: TimestampedSpeech = self.post("/with-timestamps", text, voice)?.json()?;
        let audio = base64::engine::general_purpose::STANDARD.decode(&speech.audio_base64)?;
        let alignment = speech.into_alignment().ok_or(ElevenLabsError::MissingAlignment)?;
        Ok(TimedAudio { audio, alignment })
    }
}

impl Synthesizer for ElevenLabsEngine {
    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>> {
        let response = self.post("", text, voice)?;
        let bytes = response.bytes().map_err(ElevenLabsError::from)?;
        Ok(bytes.to_vec())
    }

    fn synthesize_with_timing(&self, text: &str, voice: &VoiceConfig) -> Result<TimedAudio> {
        Ok(self.fetch_timed(text, voice)?)
    }
}
