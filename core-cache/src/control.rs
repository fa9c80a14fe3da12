//! Out-of-band control channel.
//!
//! Messages arrive as JSON objects tagged by `type`, e.g.
//! `{"type": "CLEAR_AUDIO_CACHE"}` sent by the client on logout.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};

/// A command sent to the cache layer outside of request interception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    /// Delete the whole audio cache regardless of version.
    ClearAudioCache,
    /// Warm the audio cache with `url` in the background.
    PreloadAudio { url: String },
    /// Stop the running preload, if any.
    CancelPreload,
}

impl ControlCommand {
    /// Parse a JSON control message.
    pub fn from_json(message: &str) -> Result<Self> {
        serde_json::from_str(message).map_err(|e| CacheError::InvalidCommand(e.to_string()))
    }
}

/// Result of a handled command, serialized back to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    AudioCacheCleared { removed: usize },
    PreloadStarted { key: String },
    AlreadyCached { key: String },
    PreloadCancelled { was_running: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_forms() {
        assert_eq!(
            ControlCommand::from_json(r#"{"type":"CLEAR_AUDIO_CACHE"}"#).unwrap(),
            ControlCommand::ClearAudioCache
        );
        assert_eq!(
            ControlCommand::from_json(r#"{"type":"PRELOAD_AUDIO","url":"/play/next.m4a"}"#)
                .unwrap(),
            ControlCommand::PreloadAudio {
                url: "/play/next.m4a".to_string()
            }
        );
        assert_eq!(
            ControlCommand::from_json(r#"{"type":"CANCEL_PRELOAD"}"#).unwrap(),
            ControlCommand::CancelPreload
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let err = ControlCommand::from_json(r#"{"type":"SKIP_WAITING"}"#).unwrap_err();
        assert!(matches!(err, CacheError::InvalidCommand(_)));
        assert!(ControlCommand::from_json("not json").is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(CommandOutcome::AudioCacheCleared { removed: 4 }).unwrap();
        assert_eq!(json["outcome"], "audio_cache_cleared");
        assert_eq!(json["removed"], 4);
    }
}
