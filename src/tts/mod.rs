//! Speech provider adapter.
//!
//! Resolves which engine speaks a piece of text and produces either a
//! native utterance or remote audio:
//! - Native voice (local engine, no network)
//! - Google Cloud Text-to-Speech (MP3 container audio)
//! - Gemini generative speech (raw 16-bit PCM)

pub mod cloud;
pub mod native;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audio::{PlaybackRequest, Utterance};
use crate::config::Settings;
use crate::error::ProviderError;

pub use cloud::{CloudTts, GeminiTts};
pub use native::{NativeSpeech, SystemVoice, VoiceInfo};

/// Which engine speaks. Wire names match the settings the UI writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "chrome", alias = "native")]
    Native,
    #[serde(rename = "googleCloud")]
    CloudTts,
    #[serde(rename = "gemini")]
    Gemini,
}

impl ProviderKind {
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Native)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native voice"),
            Self::CloudTts => write!(f, "Google Cloud TTS"),
            Self::Gemini => write!(f, "Gemini TTS"),
        }
    }
}

/// Everything a provider needs to speak one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    /// Native engine voice.
    pub voice: Option<String>,
    /// Remote provider voice.
    pub remote_voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

impl SpeechParams {
    /// Parameters from stored settings. A remote provider configured
    /// without an API key falls back to the native voice.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut provider = settings.tts_provider;
        if provider.is_remote() && non_blank(settings.api_key.as_deref()).is_none() {
            warn!(%provider, "No API key configured, falling back to native voice");
            provider = ProviderKind::Native;
        }
        Self {
            provider,
            api_key: settings.api_key.clone(),
            voice: settings.voice.clone(),
            remote_voice: settings.remote_voice_name.clone(),
            rate: settings.rate,
            pitch: settings.pitch,
        }
    }

    pub fn utterance(&self, text: &str) -> Utterance {
        Utterance {
            text: text.to_string(),
            voice: non_blank(self.voice.as_deref()).map(str::to_string),
            rate: self.rate,
            pitch: self.pitch,
        }
    }

    fn require_api_key(&self) -> Result<&str, ProviderError> {
        non_blank(self.api_key.as_deref())
            .ok_or_else(|| ProviderError::new(format!("An API key is required for {}", self.provider)))
    }
}

/// Base64 audio returned by a cloud provider. Also the shape persisted as
/// "most recent generated audio".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAudio {
    pub data: String,
    pub mime_type: String,
}

impl GeneratedAudio {
    pub fn to_request(&self) -> PlaybackRequest {
        PlaybackRequest::from_inline(self.data.clone(), &self.mime_type)
    }
}

/// Output of [`SpeechProvider::synthesize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    /// Speak through the native engine.
    Native(Utterance),
    /// Audio fetched from a cloud provider.
    Remote(GeneratedAudio),
}

impl Synthesis {
    pub fn generated(&self) -> Option<&GeneratedAudio> {
        match self {
            Self::Native(_) => None,
            Self::Remote(audio) => Some(audio),
        }
    }

    pub fn into_request(self) -> PlaybackRequest {
        match self {
            Self::Native(utterance) => PlaybackRequest::native(utterance),
            Self::Remote(audio) => audio.to_request(),
        }
    }
}

/// Front door over all providers. Cheap to clone (shares one HTTP client).
#[derive(Clone)]
pub struct SpeechProvider {
    cloud: CloudTts,
    gemini: GeminiTts,
}

impl SpeechProvider {
    /// `endpoint` overrides the base URL of both cloud APIs.
    pub fn new(endpoint: Option<&str>) -> Self {
        let client = reqwest::Client::new();
        let (cloud, gemini) = match non_blank(endpoint) {
            Some(base) => (
                CloudTts::with_base_url(client.clone(), base),
                GeminiTts::with_base_url(client, base),
            ),
            None => (CloudTts::new(client.clone()), GeminiTts::new(client)),
        };
        Self { cloud, gemini }
    }

    /// One speak action. Remote providers make exactly one HTTP round trip.
    pub async fn synthesize(
        &self,
        text: &str,
        params: &SpeechParams,
    ) -> Result<Synthesis, ProviderError> {
        match params.provider {
            ProviderKind::Native => Ok(Synthesis::Native(params.utterance(text))),
            ProviderKind::CloudTts => {
                let key = params.require_api_key()?;
                let voice = non_blank(params.remote_voice.as_deref()).unwrap_or(CloudTts::DEFAULT_VOICE);
                self.cloud
                    .synthesize(text, key, voice, params.rate, params.pitch)
                    .await
                    .map(Synthesis::Remote)
            }
            ProviderKind::Gemini => {
                let key = params.require_api_key()?;
                let voice = non_blank(params.remote_voice.as_deref()).unwrap_or(GeminiTts::DEFAULT_VOICE);
                self.gemini
                    .synthesize(text, key, voice)
                    .await
                    .map(Synthesis::Remote)
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
