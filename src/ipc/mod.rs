//! Message protocol between the background controller, the page-side
//! content context and the UI surfaces (side panel, popup).
//!
//! Every message is `{"action": "<name>", ...}` on the wire. Dispatch is a
//! closed enum matched exhaustively, so a renamed action cannot silently
//! fall through a relay.

pub mod bridge;
pub mod router;

use serde::{Deserialize, Serialize};

use crate::audio::StateChange;
use crate::config::Settings;
use crate::tts::{ProviderKind, VoiceInfo};

pub use router::{ContextId, Router};

/// Transport controls sent by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Play,
    Pause,
    Resume,
    Stop,
    Seek,
}

/// All inter-context messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Speak with the stored settings.
    SpeakText { text: String },
    /// Speak with explicitly supplied provider parameters.
    #[serde(rename_all = "camelCase")]
    SpeakWithProvider {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rate: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pitch: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<ProviderKind>,
    },
    AudioControl {
        control: Control,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<f64>,
    },
    /// Session state broadcast to the UIs.
    AudioStateChange(StateChange),
    /// Ask the page for its current selection.
    GetSelectedText {},
    /// The page's reply to `getSelectedText`.
    SelectedText { text: String },
    SaveSettings { settings: Settings },
    /// Ask for the native engine's voice list.
    GetVoices {},
    Voices { voices: Vec<VoiceInfo> },
    /// Human-readable status line for the UI.
    Status { message: String },
}

impl Message {
    /// Wire action name, for log lines.
    pub fn action(&self) -> &'static str {
        match self {
            Self::SpeakText { .. } => "speakText",
            Self::SpeakWithProvider { .. } => "speakWithProvider",
            Self::AudioControl { .. } => "audioControl",
            Self::AudioStateChange(_) => "audioStateChange",
            Self::GetSelectedText {} => "getSelectedText",
            Self::SelectedText { .. } => "selectedText",
            Self::SaveSettings { .. } => "saveSettings",
            Self::GetVoices {} => "getVoices",
            Self::Voices { .. } => "voices",
            Self::Status { .. } => "status",
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }
}
