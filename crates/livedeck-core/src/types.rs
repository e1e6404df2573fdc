//! Core types for Livedeck

use crate::ads::{Ad, AdKind};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why main content could not be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    /// Stable error code
    pub code: String,
    /// Message suitable for the error banner
    pub message: String,
    /// Raw error text, for logs and details panes
    pub details: String,
}

impl From<&Error> for PlaybackFailure {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.friendly_message(),
            details: error.to_string(),
        }
    }
}

/// Playback sequencer states
///
/// Every state except `Idle` belongs to exactly one selected channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No channel selected
    Idle,
    /// Counting down before the pre-roll ad starts
    PreRollCountdown { channel_id: String, remaining: u32 },
    /// Pre-roll ad is playing on the ad player
    PreRollPlaying {
        channel_id: String,
        ad: Ad,
        skip_remaining: u32,
        position: f64,
    },
    /// Main stream is being loaded into the external player
    MainLoading { channel_id: String },
    /// Main stream is playing
    MainPlaying { channel_id: String },
    /// Main stream paused, counting down to a mid-roll ad
    MidRollCountdown { channel_id: String, remaining: u32 },
    /// Mid-roll ad is playing on the ad player
    MidRollPlaying {
        channel_id: String,
        ad: Ad,
        skip_remaining: u32,
        position: f64,
    },
    /// Main stream failed; waits for a user retry
    Failed {
        channel_id: String,
        failure: PlaybackFailure,
    },
}

impl PlaybackState {
    /// Countdown state for an ad of the given kind
    pub fn countdown(kind: AdKind, channel_id: &str, remaining: u32) -> Self {
        let channel_id = channel_id.to_string();
        match kind {
            AdKind::PreRoll => PlaybackState::PreRollCountdown { channel_id, remaining },
            AdKind::MidRoll => PlaybackState::MidRollCountdown { channel_id, remaining },
        }
    }

    /// Ad playback state for the given ad
    pub fn ad_playing(channel_id: &str, ad: Ad, skip_remaining: u32, position: f64) -> Self {
        let channel_id = channel_id.to_string();
        match ad.kind {
            AdKind::PreRoll => PlaybackState::PreRollPlaying {
                channel_id,
                ad,
                skip_remaining,
                position,
            },
            AdKind::MidRoll => PlaybackState::MidRollPlaying {
                channel_id,
                ad,
                skip_remaining,
                position,
            },
        }
    }

    /// Channel this state belongs to
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::PreRollCountdown { channel_id, .. }
            | PlaybackState::PreRollPlaying { channel_id, .. }
            | PlaybackState::MainLoading { channel_id }
            | PlaybackState::MainPlaying { channel_id }
            | PlaybackState::MidRollCountdown { channel_id, .. }
            | PlaybackState::MidRollPlaying { channel_id, .. }
            | PlaybackState::Failed { channel_id, .. } => Some(channel_id),
        }
    }

    /// Ad currently on screen, if any
    pub fn ad(&self) -> Option<&Ad> {
        match self {
            PlaybackState::PreRollPlaying { ad, .. } | PlaybackState::MidRollPlaying { ad, .. } => Some(ad),
            _ => None,
        }
    }

    /// True while an ad countdown or an ad is showing
    pub fn is_ad_break(&self) -> bool {
        matches!(
            self,
            PlaybackState::PreRollCountdown { .. }
                | PlaybackState::PreRollPlaying { .. }
                | PlaybackState::MidRollCountdown { .. }
                | PlaybackState::MidRollPlaying { .. }
        )
    }

    /// True when a skip request would end the current ad
    pub fn can_skip(&self) -> bool {
        matches!(
            self,
            PlaybackState::PreRollPlaying { skip_remaining: 0, .. }
                | PlaybackState::MidRollPlaying { skip_remaining: 0, .. }
        )
    }

    /// Check whether the sequencer may move from this state to `target`
    pub fn can_transition_to(&self, target: &PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // Teardown
            (_, Idle) |
            // Session start
            (Idle, PreRollCountdown { .. }) | (Idle, MainLoading { .. }) |
            // Pre-roll
            (PreRollCountdown { .. }, PreRollCountdown { .. }) |
            (PreRollCountdown { .. }, PreRollPlaying { .. }) |
            (PreRollCountdown { .. }, MainLoading { .. }) |
            (PreRollPlaying { .. }, PreRollPlaying { .. }) |
            (PreRollPlaying { .. }, MainLoading { .. }) |
            // Main content
            (MainLoading { .. }, MainPlaying { .. }) | (MainLoading { .. }, Failed { .. }) |
            (MainPlaying { .. }, MidRollCountdown { .. }) | (MainPlaying { .. }, Failed { .. }) |
            // Mid-roll
            (MidRollCountdown { .. }, MidRollCountdown { .. }) |
            (MidRollCountdown { .. }, MidRollPlaying { .. }) |
            (MidRollCountdown { .. }, MainPlaying { .. }) |
            (MidRollPlaying { .. }, MidRollPlaying { .. }) |
            (MidRollPlaying { .. }, MainPlaying { .. }) |
            // Retry
            (Failed { .. }, MainLoading { .. })
        )
    }

    /// "Now playing" status label
    pub fn status_label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Ready to Play",
            PlaybackState::PreRollCountdown { .. }
            | PlaybackState::PreRollPlaying { .. }
            | PlaybackState::MidRollCountdown { .. }
            | PlaybackState::MidRollPlaying { .. } => "Advertisement Playing",
            PlaybackState::MainLoading { .. } => "Loading live stream…",
            PlaybackState::MainPlaying { .. } => "Live • Watching Now",
            PlaybackState::Failed { .. } => "Error loading channel",
        }
    }

    /// Overlay visibility for this state
    pub fn overlay(&self) -> Overlay {
        let mut overlay = Overlay::default();
        match self {
            PlaybackState::PreRollCountdown { .. } => {
                overlay.ad_countdown = true;
                overlay.ad_controls = true;
            }
            PlaybackState::MidRollCountdown { .. } => {
                overlay.midroll_indicator = true;
            }
            PlaybackState::PreRollPlaying { skip_remaining, .. }
            | PlaybackState::MidRollPlaying { skip_remaining, .. } => {
                overlay.ad_controls = true;
                overlay.skip_enabled = *skip_remaining == 0;
            }
            PlaybackState::MainLoading { .. } => {
                overlay.loading = true;
            }
            PlaybackState::Failed { .. } => {
                overlay.error_banner = true;
            }
            PlaybackState::Idle | PlaybackState::MainPlaying { .. } => {}
        }
        overlay
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::PreRollCountdown { remaining, .. } => write!(f, "pre-roll countdown ({remaining}s)"),
            PlaybackState::PreRollPlaying { .. } => write!(f, "pre-roll playing"),
            PlaybackState::MainLoading { .. } => write!(f, "main loading"),
            PlaybackState::MainPlaying { .. } => write!(f, "main playing"),
            PlaybackState::MidRollCountdown { remaining, .. } => write!(f, "mid-roll countdown ({remaining}s)"),
            PlaybackState::MidRollPlaying { .. } => write!(f, "mid-roll playing"),
            PlaybackState::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Visibility of the ad and status overlays drawn over the video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    /// Big countdown shown before a pre-roll
    pub ad_countdown: bool,
    /// Ad progress bar and skip button
    pub ad_controls: bool,
    /// Whether the skip button accepts clicks
    pub skip_enabled: bool,
    /// Small "ad in N" indicator before a mid-roll
    pub midroll_indicator: bool,
    /// Loading spinner
    pub loading: bool,
    /// Error banner with retry button
    pub error_banner: bool,
}

/// Events published by the sequencer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequencerEvent {
    /// A session was created for a channel
    SessionStarted { session: SessionId, channel_id: String },
    /// A session moved to a new state
    StateChanged { session: SessionId, state: PlaybackState },
    /// A session and all its timers are gone
    SessionEnded { session: SessionId },
}

impl SequencerEvent {
    pub fn session(&self) -> SessionId {
        match self {
            SequencerEvent::SessionStarted { session, .. }
            | SequencerEvent::StateChanged { session, .. }
            | SequencerEvent::SessionEnded { session } => *session,
        }
    }
}
