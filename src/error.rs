//! Error taxonomy shared by the controller, the helper and the providers.
//!
//! Every error is terminal to the operation that produced it and is
//! surfaced to the UI as a human-readable string. Nothing retries.

use std::fmt;

/// A cloud speech API rejected the request or returned no audio.
///
/// `message` is the upstream error text when the API supplied one,
/// otherwise the HTTP reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderError {}

/// The audio helper could not be brought up (no output device, thread
/// spawn failure, ...).
///
/// `Clone` because one creation result is handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationError(pub String);

impl fmt::Display for CreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not start audio helper: {}", self.0)
    }
}

impl std::error::Error for CreationError {}

/// The native engine or the audio backend reported a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackError(pub String);

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PlaybackError {}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    Provider(ProviderError),
    Creation(CreationError),
    Playback(PlaybackError),
    /// No text is selected. A precondition, not a fault.
    Selection,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(e) => write!(f, "{}", e),
            Self::Creation(e) => write!(f, "{}", e),
            Self::Playback(e) => write!(f, "Audio playback failed: {}", e),
            Self::Selection => write!(f, "No text selected on the page."),
        }
    }
}

impl std::error::Error for ReaderError {}

impl ReaderError {
    /// Whether this should be shown as a plain status rather than an error.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Selection)
    }
}

impl From<ProviderError> for ReaderError {
    fn from(e: ProviderError) -> Self {
        Self::Provider(e)
    }
}

impl From<CreationError> for ReaderError {
    fn from(e: CreationError) -> Self {
        Self::Creation(e)
    }
}

impl From<PlaybackError> for ReaderError {
    fn from(e: PlaybackError) -> Self {
        Self::Playback(e)
    }
}
