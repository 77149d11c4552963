//! Read-aloud core: speaks selected page text through a native voice or a
//! cloud speech API, with a single playback session shared by every UI.
//!
//! Talks to the host (page script, side panel, popup) via JSON-line
//! messages on stdin/stdout.

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod helper;
pub mod ipc;
pub mod logger;
pub mod tts;

#[cfg(test)]
mod test_support;
