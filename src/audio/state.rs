//! Playback state vocabulary and the state-change events broadcast to UIs.

use serde::{Deserialize, Serialize};

/// Playback session states.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    /// No session. A new `start` is accepted.
    Idle,
    /// Waiting on a cloud provider to return audio.
    Generating,
    /// A handle exists and is producing sound.
    Playing,
    /// A handle exists but is paused.
    Paused,
    /// Audio ran to completion. Transient: the session settles back to Idle.
    Ended,
    /// Terminal failure of the last session. Accepts a new `start` like Idle.
    Error(String),
}

impl PlaybackState {
    /// Generating, Playing or Paused.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Generating | Self::Playing | Self::Paused)
    }

    /// Playing or Paused: the states in which a handle must exist.
    pub fn holds_handle(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Generating => write!(f, "generating"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Ended => write!(f, "ended"),
            Self::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// A state-change notification.
///
/// Serialized as `{"state": "<name>", ...}`, the shape the side panel's
/// seek bar and status label consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StateChange {
    Generating,
    Playing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    Paused,
    Ended,
    #[serde(rename = "timeupdate", rename_all = "camelCase")]
    TimeUpdate {
        current_time: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    Error {
        error: String,
    },
}

impl StateChange {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Playing { .. } => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::TimeUpdate { .. } => "timeupdate",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(PlaybackState::Generating.is_active());
        assert!(PlaybackState::Playing.is_active());
        assert!(PlaybackState::Paused.is_active());
        assert!(!PlaybackState::Idle.is_active());
        assert!(!PlaybackState::Ended.is_active());
        assert!(!PlaybackState::Error("x".into()).is_active());
        assert!(!PlaybackState::Generating.holds_handle());
    }

    #[test]
    fn test_state_change_wire_shape() {
        let json = serde_json::to_value(StateChange::TimeUpdate {
            current_time: 1.5,
            duration: Some(10.0),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "timeupdate", "currentTime": 1.5, "duration": 10.0})
        );

        let json = serde_json::to_value(StateChange::Playing { duration: None }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "playing"}));

        let json = serde_json::to_value(StateChange::error("quota")).unwrap();
        assert_eq!(json, serde_json::json!({"state": "error", "error": "quota"}));
    }

    #[test]
    fn test_state_change_parses_ui_payload() {
        let parsed: StateChange = serde_json::from_str(r#"{"state":"paused"}"#).unwrap();
        assert_eq!(parsed, StateChange::Paused);
        let parsed: StateChange =
            serde_json::from_str(r#"{"state":"timeupdate","currentTime":3.0}"#).unwrap();
        assert_eq!(
            parsed,
            StateChange::TimeUpdate {
                current_time: 3.0,
                duration: None
            }
        );
    }
}
