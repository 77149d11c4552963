//! Cloud speech adapters: Google Cloud Text-to-Speech and Gemini TTS.
//!
//! Each adapter issues one POST per speak action and returns the base64
//! audio untouched. No retry, no streaming.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::info;

use super::GeneratedAudio;
use crate::error::ProviderError;

const NO_AUDIO: &str = "No audio content in API response.";

// ---------------------------------------------------------------------------
// Google Cloud Text-to-Speech
// ---------------------------------------------------------------------------

/// Google Cloud TTS: `POST {base}/v1/text:synthesize?key=...`.
///
/// Body: `{"input":{"text"},"voice":{"languageCode","name"},"audioConfig":{...}}`
/// Returns `{"audioContent": "<base64 mp3>"}`.
#[derive(Clone)]
pub struct CloudTts {
    client: reqwest::Client,
    base_url: String,
}

impl CloudTts {
    pub const DEFAULT_BASE_URL: &'static str = "https://texttospeech.googleapis.com";
    pub const DEFAULT_VOICE: &'static str = "Wavenet-A";

    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        api_key: &str,
        voice: &str,
        rate: f32,
        pitch: f32,
    ) -> Result<GeneratedAudio, ProviderError> {
        let name = qualify_voice_name(voice);
        info!(voice = %name, text_len = text.len(), "Cloud TTS request");

        let body = cloud_tts_body(text, &name, rate, pitch);
        let url = format!("{}/v1/text:synthesize", self.base_url);
        let json = post_json(&self.client, &url, api_key, &body).await?;
        let audio = parse_cloud_tts_response(&json)?;

        info!(bytes_b64 = audio.data.len(), "Cloud TTS synthesis complete");
        Ok(audio)
    }
}

/// Voice names without a language prefix (`Wavenet-A`) are qualified as
/// US English (`en-US-Wavenet-A`).
pub fn qualify_voice_name(voice: &str) -> String {
    if language_code(voice).is_some() {
        voice.to_string()
    } else {
        format!("en-US-{}", voice)
    }
}

/// `en-GB` from `en-GB-Neural2-B`.
fn language_code(voice: &str) -> Option<&str> {
    let mut parts = voice.splitn(3, '-');
    let lang = parts.next()?;
    let region = parts.next()?;
    let lang_ok = (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.len() == 2 && region.chars().all(|c| c.is_ascii_uppercase());
    if lang_ok && region_ok {
        Some(&voice[..lang.len() + 1 + region.len()])
    } else {
        None
    }
}

fn cloud_tts_body(text: &str, qualified_voice: &str, rate: f32, pitch: f32) -> Value {
    let language = language_code(qualified_voice).unwrap_or("en-US");
    serde_json::json!({
        "input": { "text": text },
        "voice": { "languageCode": language, "name": qualified_voice },
        "audioConfig": {
            "audioEncoding": "MP3",
            "speakingRate": rate.clamp(0.25, 4.0),
            "pitch": pitch.clamp(-20.0, 20.0),
        }
    })
}

pub fn parse_cloud_tts_response(json: &Value) -> Result<GeneratedAudio, ProviderError> {
    json.get("audioContent")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())
        .map(|data| GeneratedAudio {
            data: data.to_string(),
            mime_type: "audio/mpeg".to_string(),
        })
        .ok_or_else(|| ProviderError::new(NO_AUDIO))
}

// ---------------------------------------------------------------------------
// Gemini TTS
// ---------------------------------------------------------------------------

/// Gemini generative speech: `POST {base}/v1beta/models/{model}:generateContent?key=...`.
///
/// Returns raw 16-bit PCM in `candidates[0].content.parts[0].inlineData`
/// with the sample rate in the MIME type (`audio/L16;codec=pcm;rate=24000`).
#[derive(Clone)]
pub struct GeminiTts {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiTts {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash-preview-tts";
    pub const DEFAULT_VOICE: &'static str = "Zephyr";

    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        api_key: &str,
        voice: &str,
    ) -> Result<GeneratedAudio, ProviderError> {
        info!(voice = %voice, model = %self.model, text_len = text.len(), "Gemini TTS request");

        let body = gemini_body(text, voice);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let json = post_json(&self.client, &url, api_key, &body).await?;
        let audio = parse_gemini_response(&json)?;

        info!(mime = %audio.mime_type, bytes_b64 = audio.data.len(), "Gemini TTS synthesis complete");
        Ok(audio)
    }
}

fn gemini_body(text: &str, voice: &str) -> Value {
    serde_json::json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            }
        }
    })
}

pub fn parse_gemini_response(json: &Value) -> Result<GeneratedAudio, ProviderError> {
    let inline = json
        .pointer("/candidates/0/content/parts/0/inlineData")
        .ok_or_else(|| ProviderError::new(NO_AUDIO))?;
    let data = inline.get("data").and_then(Value::as_str).filter(|d| !d.is_empty());
    let mime = inline
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|m| m.starts_with("audio/"));
    match (data, mime) {
        (Some(data), Some(mime)) => Ok(GeneratedAudio {
            data: data.to_string(),
            mime_type: mime.to_string(),
        }),
        _ => Err(ProviderError::new(NO_AUDIO)),
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> Result<Value, ProviderError> {
    let resp = client
        .post(url)
        .query(&[("key", api_key)])
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::new(format!("Speech request failed: {}", e)))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ProviderError::new(format!("Speech request failed: {}", e)))?;
    if !status.is_success() {
        return Err(error_from_response(status, &text));
    }

    serde_json::from_str(&text)
        .map_err(|e| ProviderError::new(format!("Malformed API response: {}", e)))
}

/// Upstream `error.message` when the body carries one, else the HTTP
/// reason phrase.
pub fn error_from_response(status: StatusCode, body: &str) -> ProviderError {
    let upstream = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.pointer("/error/message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    });
    let message = upstream.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string())
    });
    ProviderError::new(message)
}
