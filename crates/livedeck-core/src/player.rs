//! Seams to the external players
//!
//! The adaptive player (manifest parsing, ABR, decryption) and the ad
//! player live outside this crate. The sequencer drives them through these
//! traits and receives their events through
//! [`PlaybackSequencer::player_event`](crate::PlaybackSequencer::player_event)
//! and [`PlaybackSequencer::ad_event`](crate::PlaybackSequencer::ad_event).

use crate::channel::Channel;
use crate::config::PlayerConfig;
use crate::drm::DrmConfig;
use crate::error::Result;
use crate::filter::RequestFilter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Complete configuration handed to the adaptive player before a load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerOptions {
    pub streaming: PlayerConfig,
    pub drm: DrmConfig,
}

impl PlayerOptions {
    pub fn for_channel(config: &PlayerConfig, channel: &Channel) -> Self {
        Self {
            streaming: config.clone(),
            drm: DrmConfig::for_channel(channel),
        }
    }
}

/// External adaptive streaming player
#[async_trait]
pub trait MediaPlayer: Send + 'static {
    /// Apply streaming and DRM options
    async fn configure(&mut self, options: &PlayerOptions) -> Result<()>;

    /// Install the request filter, replacing any previous one.
    /// `None` clears all filters.
    fn set_request_filter(&mut self, filter: Option<RequestFilter>);

    /// Load a manifest
    async fn load(&mut self, url: &Url) -> Result<()>;

    /// Tear down the current load
    async fn unload(&mut self) -> Result<()>;

    /// Start or resume playback
    async fn play(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;
}

/// Secondary player used for ads
#[async_trait]
pub trait AdPlayer: Send + 'static {
    async fn load(&mut self, url: &Url) -> Result<()>;

    async fn play(&mut self) -> Result<()>;

    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Stop playback and release the source
    async fn stop(&mut self);
}

/// Events reported by the adaptive player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Playback position changed (seconds)
    TimeUpdate { position: f64 },
    /// The player hit an error it could not recover from
    Error { code: u32, message: String },
    /// Stream ended
    Ended,
}

/// Events reported by the ad player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AdEvent {
    Ended,
    Error { message: String },
}
