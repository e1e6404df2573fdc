//! Error types for Livedeck Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Livedeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Livedeck error types
#[derive(Error, Debug)]
pub enum Error {
    // Channel list errors
    #[error("Channel list request failed with HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Invalid channel list response: {0}")]
    InvalidResponse(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    // Playback errors
    #[error("Invalid stream URL {url}: {source}")]
    InvalidStreamUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Player error {code}: {message}")]
    Player { code: u32, message: String },

    #[error("Live stream ended")]
    StreamEnded,

    #[error("Ad playback failed: {0}")]
    AdPlayback(String),

    #[error("No active playback session")]
    NoActiveSession,

    #[error("Nothing to retry while {0}")]
    NothingToRetry(String),

    // DRM errors
    #[error("Invalid clear-key value: {0}")]
    InvalidKey(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a player error from an external player's error code
    pub fn player(code: u32, message: impl Into<String>) -> Self {
        Error::Player {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the user can retry the failed operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus { .. }
                | Error::InvalidResponse(_)
                | Error::InvalidStreamUrl { .. }
                | Error::Player { .. }
                | Error::StreamEnded
                | Error::AdPlayback(_)
                | Error::Network(_)
        )
    }

    /// Returns the error code for tracking and display
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::HttpStatus { .. } => "HTTP_STATUS",
            Error::InvalidResponse(_) => "INVALID_RESPONSE",
            Error::ChannelNotFound(_) => "CHANNEL_NOT_FOUND",
            Error::InvalidStreamUrl { .. } => "INVALID_STREAM_URL",
            Error::Player { .. } => "PLAYER",
            Error::StreamEnded => "STREAM_ENDED",
            Error::AdPlayback(_) => "AD_PLAYBACK",
            Error::NoActiveSession => "NO_SESSION",
            Error::NothingToRetry(_) => "NOTHING_TO_RETRY",
            Error::InvalidKey(_) => "INVALID_KEY",
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Internal(_) => "INTERNAL",
            Error::Io(_) => "IO",
        }
    }

    /// User-facing message for the error banner
    pub fn friendly_message(&self) -> String {
        match self {
            Error::Player { code, .. } => PlayerErrorCategory::from_code(*code)
                .friendly_message()
                .to_string(),
            Error::InvalidStreamUrl { .. } => "This channel has an invalid stream address.".to_string(),
            Error::StreamEnded => "The live stream ended. Retry to reconnect.".to_string(),
            Error::HttpStatus { .. } | Error::InvalidResponse(_) | Error::Network(_) => {
                "Failed to load channels. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Category of an external player error, derived from its numeric code.
///
/// Codes are grouped by thousands: `1xxx` network, `4xxx` manifest,
/// `6xxx` DRM and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerErrorCategory {
    Network,
    Text,
    Media,
    Manifest,
    Streaming,
    Drm,
    Player,
    Cast,
    Storage,
    Ads,
    Unknown,
}

impl PlayerErrorCategory {
    /// Classify a player error code
    pub fn from_code(code: u32) -> Self {
        match code / 1000 {
            1 => PlayerErrorCategory::Network,
            2 => PlayerErrorCategory::Text,
            3 => PlayerErrorCategory::Media,
            4 => PlayerErrorCategory::Manifest,
            5 => PlayerErrorCategory::Streaming,
            6 => PlayerErrorCategory::Drm,
            7 => PlayerErrorCategory::Player,
            8 => PlayerErrorCategory::Cast,
            9 => PlayerErrorCategory::Storage,
            10 => PlayerErrorCategory::Ads,
            _ => PlayerErrorCategory::Unknown,
        }
    }

    pub fn friendly_message(&self) -> &'static str {
        match self {
            PlayerErrorCategory::Network => "Network problem while loading the stream. Check your connection and retry.",
            PlayerErrorCategory::Text => "Subtitles could not be loaded.",
            PlayerErrorCategory::Media => "The stream uses a format this device cannot play.",
            PlayerErrorCategory::Manifest => "The channel's stream is unavailable right now.",
            PlayerErrorCategory::Streaming => "The stream stopped unexpectedly.",
            PlayerErrorCategory::Drm => "This channel is protected and could not be decrypted.",
            PlayerErrorCategory::Player => "The player could not start playback.",
            PlayerErrorCategory::Cast => "Casting failed.",
            PlayerErrorCategory::Storage => "Offline storage is unavailable.",
            PlayerErrorCategory::Ads => "An advertisement failed to load.",
            PlayerErrorCategory::Unknown => "Playback failed. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(PlayerErrorCategory::from_code(1001), PlayerErrorCategory::Network);
        assert_eq!(PlayerErrorCategory::from_code(4000), PlayerErrorCategory::Manifest);
        assert_eq!(PlayerErrorCategory::from_code(6007), PlayerErrorCategory::Drm);
        assert_eq!(PlayerErrorCategory::from_code(10001), PlayerErrorCategory::Ads);
        assert_eq!(PlayerErrorCategory::from_code(42), PlayerErrorCategory::Unknown);
    }

    #[test]
    fn test_player_error_friendly_message() {
        let err = Error::player(6007, "LICENSE_REQUEST_FAILED");
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "PLAYER");
        assert!(err.friendly_message().contains("protected"));
    }

    #[test]
    fn test_not_recoverable() {
        assert!(!Error::InvalidConfig("bad".into()).is_recoverable());
        assert!(!Error::NoActiveSession.is_recoverable());
    }
}
