//! Native (on-device) speech.
//!
//! The native engine renders an utterance to WAV which then plays through
//! the same helper as cloud audio, so every source has one handle model.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::audio::{AudioResource, Utterance};
use crate::error::PlaybackError;

/// A voice the native engine offers. `id` is what goes into
/// `Settings::voice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
}

/// Renders an utterance to playable audio (dyn-compatible).
pub trait NativeSpeech: Send + Sync {
    fn render<'a>(
        &'a self,
        utterance: &'a Utterance,
    ) -> Pin<Box<dyn Future<Output = Result<AudioResource, PlaybackError>> + Send + 'a>>;

    /// Voices available for `Utterance::voice`. Engines that cannot list
    /// them report none.
    fn voices(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VoiceInfo>, PlaybackError>> + Send + '_>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Words per minute at rate 1.0.
const BASE_WPM: f32 = 175.0;
/// Engine pitch at pitch 1.0 (engine range 0-99).
const BASE_PITCH: f32 = 50.0;

/// The system speech synthesizer (`espeak-ng` by default), driven as a
/// child process that writes WAV to stdout. Text goes in over stdin so it
/// can never be mistaken for a flag.
pub struct SystemVoice {
    program: String,
}

impl SystemVoice {
    pub const DEFAULT_PROGRAM: &'static str = "espeak-ng";

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(utterance: &Utterance) -> Vec<String> {
        let wpm = (BASE_WPM * utterance.rate).round().clamp(80.0, 450.0) as u32;
        let pitch = (BASE_PITCH * utterance.pitch).round().clamp(0.0, 99.0) as u32;
        let mut args = vec![
            "--stdout".to_string(),
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
        ];
        if let Some(voice) = &utterance.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args
    }

    async fn run(&self, utterance: &Utterance) -> Result<Vec<u8>, PlaybackError> {
        let args = Self::args(utterance);
        debug!(program = %self.program, ?args, "Spawning native speech engine");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError(format!("Could not start {}: {}", self.program, e)))?;

        // Feed stdin while collecting stdout so a long text cannot fill
        // both pipes.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(utterance.text.as_bytes()).await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output =
            output.map_err(|e| PlaybackError(format!("{} failed: {}", self.program, e)))?;
        if let Err(e) = fed {
            return Err(PlaybackError(format!(
                "Failed to send text to {}: {}",
                self.program, e
            )));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(PlaybackError(if detail.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                format!("{}: {}", self.program, detail)
            }));
        }
        if output.stdout.is_empty() {
            return Err(PlaybackError(format!("{} produced no audio", self.program)));
        }
        Ok(output.stdout)
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, PlaybackError> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlaybackError(format!("Could not start {}: {}", self.program, e)))?;
        if !output.status.success() {
            return Err(PlaybackError(format!(
                "{} --voices exited with {}",
                self.program, output.status
            )));
        }
        Ok(parse_voice_table(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the `--voices` table:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
fn parse_voice_table(table: &str) -> Vec<VoiceInfo> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let language = columns.nth(1)?;
            let name = columns.nth(1)?;
            Some(VoiceInfo {
                id: language.to_string(),
                name: name.replace('_', " "),
            })
        })
        .collect()
}

impl Default for SystemVoice {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

impl NativeSpeech for SystemVoice {
    fn render<'a>(
        &'a self,
        utterance: &'a Utterance,
    ) -> Pin<Box<dyn Future<Output = Result<AudioResource, PlaybackError>> + Send + 'a>> {
        Box::pin(async move {
            let wav = self.run(utterance).await?;
            info!(bytes = wav.len(), "Native speech rendered");
            Ok(AudioResource::new(wav, "audio/wav"))
        })
    }

    fn voices(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VoiceInfo>, PlaybackError>> + Send + '_>> {
        Box::pin(async move {
            let voices = self.list_voices().await?;
            debug!(count = voices.len(), "Listed native voices");
            Ok(voices)
        })
    }
}
