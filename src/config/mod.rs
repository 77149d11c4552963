//! Settings and persisted state.
//!
//! Two JSON files under the data directory:
//! - `settings.json`: the user's settings, written by the settings panel
//! - `last_audio.json`: the most recent cloud audio, replayed by "play"

pub mod paths;

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tts::{GeneratedAudio, ProviderKind};

/// Settings shape (camelCase, shared with the UI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub tts_provider: ProviderKind,
    /// Native engine voice.
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_unit")]
    pub rate: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Voice for the cloud providers.
    #[serde(default)]
    pub remote_voice_name: Option<String>,
    /// Base URL override for the cloud APIs.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Native speech program (defaults to espeak-ng).
    #[serde(default)]
    pub native_command: Option<String>,
    #[serde(default)]
    pub output_device: Option<String>,
    #[serde(default = "default_unit")]
    pub volume: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tts_provider: ProviderKind::default(),
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            api_key: None,
            remote_voice_name: None,
            endpoint: None,
            native_command: None,
            output_device: None,
            volume: 1.0,
        }
    }
}

/// Generated audio as persisted, with the time it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAudio {
    #[serde(flatten)]
    pub audio: GeneratedAudio,
    pub saved_at: DateTime<Utc>,
}

/// Reads and writes the JSON files in one directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform data directory.
    pub fn open_default() -> Self {
        Self::new(paths::get_data_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join("settings.json")
    }

    pub fn last_audio_path(&self) -> PathBuf {
        self.dir.join("last_audio.json")
    }

    /// Stored settings, or defaults when the file is missing or unreadable.
    pub fn load(&self) -> Settings {
        read_json_file(&self.settings_path()).unwrap_or_default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        write_json_file(&self.settings_path(), settings)
    }

    /// Overwrite the most recent generated audio.
    pub fn save_last_audio(&self, audio: &GeneratedAudio) -> io::Result<()> {
        let stored = StoredAudio {
            audio: audio.clone(),
            saved_at: Utc::now(),
        };
        write_json_file(&self.last_audio_path(), &stored)
    }

    pub fn load_last_audio(&self) -> Option<StoredAudio> {
        read_json_file(&self.last_audio_path())
    }
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

/// Write via a temp file and rename so readers never see half a file.
fn write_json_file<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}
