//! Audio playback: requests, resources, the backend seam and the session
//! state machine.

pub mod decode;
pub mod session;
pub mod state;
pub mod wav;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::PlaybackError;

pub use session::{PlaybackSession, Ticket};
pub use state::{PlaybackState, StateChange};

// ── Requests ────────────────────────────────────────────────────────

/// Parameters for the native speech engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

/// Where the audio of a playback request comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Rendered locally by the native speech engine.
    NativeVoice(Utterance),
    /// Base64 container audio (MP3, WAV) with its MIME type.
    EncodedAudio { payload: String, mime: String },
    /// Base64 16-bit little-endian mono samples.
    RawPcm {
        payload: String,
        sample_rate: Option<u32>,
    },
}

/// One speak action's audio. Immutable once built, consumed by one session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub source: AudioSource,
}

impl PlaybackRequest {
    pub fn native(utterance: Utterance) -> Self {
        Self {
            source: AudioSource::NativeVoice(utterance),
        }
    }

    pub fn encoded(payload: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            source: AudioSource::EncodedAudio {
                payload: payload.into(),
                mime: mime.into(),
            },
        }
    }

    pub fn raw_pcm(payload: impl Into<String>, sample_rate: Option<u32>) -> Self {
        Self {
            source: AudioSource::RawPcm {
                payload: payload.into(),
                sample_rate,
            },
        }
    }

    /// Build a request from inline base64 audio tagged with a MIME type.
    /// Bare PCM MIME types carry their sample rate as `rate=<n>`.
    pub fn from_inline(payload: impl Into<String>, mime: &str) -> Self {
        if wav::is_raw_pcm_mime(mime) {
            Self::raw_pcm(payload, wav::sample_rate_from_mime(mime))
        } else {
            Self::encoded(payload, mime)
        }
    }
}

/// Container bytes handed to the backend. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResource {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

impl AudioResource {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }
}

// ── Handle events ───────────────────────────────────────────────────

/// Notification from a live audio handle.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEventKind {
    /// Native progress tick with the current position in seconds.
    Progress { position: f64 },
    /// Audio ran to its natural end.
    Ended,
    /// The backend failed mid-playback.
    Failed(String),
}

/// A handle event stamped with the session generation that opened it.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleEvent {
    pub generation: u64,
    pub kind: HandleEventKind,
}

/// Sender given to a backend when a handle is opened.
#[derive(Debug, Clone)]
pub struct HandleEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<HandleEvent>,
}

impl HandleEventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<HandleEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn progress(&self, position: f64) {
        self.send(HandleEventKind::Progress { position });
    }

    pub fn ended(&self) {
        self.send(HandleEventKind::Ended);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(HandleEventKind::Failed(message.into()));
    }

    fn send(&self, kind: HandleEventKind) {
        // The controller owns the receiver; if it is gone nobody is listening.
        let _ = self.tx.send(HandleEvent {
            generation: self.generation,
            kind,
        });
    }
}

// ── Backend seam ────────────────────────────────────────────────────

/// A playing piece of audio. Owned exclusively by the active session.
pub trait AudioHandle: Send {
    fn pause(&mut self);
    fn resume(&mut self);
    /// Stop and release the underlying audio. Idempotent.
    fn stop(&mut self);
    /// Seek to `position` seconds. Callers clamp beforehand.
    fn seek(&mut self, position: f64);
    /// Total length in seconds, when the backend knows it.
    fn duration(&self) -> Option<f64>;
}

/// Something that can turn container bytes into a playing handle.
pub trait AudioBackend: Send + Sync {
    fn open(
        &self,
        resource: AudioResource,
        events: HandleEventSink,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AudioHandle>, PlaybackError>> + Send + '_>>;
}
