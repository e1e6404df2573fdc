//! Synthetic ads shown around the main stream

use crate::config::AdsConfig;
use chrono::Utc;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use url::Url;

/// Fraction of the ad duration after which an ad counts as complete.
/// Progress polling is coarse, so waiting for exactly 100% can miss the end.
pub const COMPLETION_THRESHOLD: f64 = 0.98;

/// Where an ad is placed relative to the main content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdKind {
    PreRoll,
    MidRoll,
}

impl AdKind {
    fn id_prefix(&self) -> &'static str {
        match self {
            AdKind::PreRoll => "preroll",
            AdKind::MidRoll => "midroll",
        }
    }
}

impl std::fmt::Display for AdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdKind::PreRoll => write!(f, "pre-roll"),
            AdKind::MidRoll => write!(f, "mid-roll"),
        }
    }
}

/// A single ad impression, created on demand and discarded after playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub url: Url,
    pub kind: AdKind,
    /// Nominal duration in seconds
    pub duration: f64,
}

impl Ad {
    pub fn new(kind: AdKind, url: Url, duration: f64) -> Self {
        Self {
            id: format!("{}-{}", kind.id_prefix(), Utc::now().timestamp_millis()),
            url,
            kind,
            duration,
        }
    }

    /// Pick a random ad of the given kind from the configured servers
    pub fn choose(kind: AdKind, config: &AdsConfig) -> Option<Self> {
        let servers = match kind {
            AdKind::PreRoll => &config.servers.pre_roll,
            AdKind::MidRoll => &config.servers.mid_roll,
        };
        servers
            .choose(&mut rand::rng())
            .map(|url| Ad::new(kind, url.clone(), config.ad_duration_secs))
    }

    /// Playback progress in the range `0.0..=1.0`
    pub fn progress(&self, position: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (position / self.duration).clamp(0.0, 1.0)
    }

    /// True once the ad has played far enough to count as complete
    pub fn is_complete_at(&self, position: f64) -> bool {
        self.progress(position) >= COMPLETION_THRESHOLD
    }
}
