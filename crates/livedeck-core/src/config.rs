//! Application configuration
//!
//! Every section has defaults matching the production front end, so a
//! config file only needs to name the values it overrides.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://static-crane-seeutech-17dd4df3.koyeb.app";

const DEFAULT_PRE_ROLL_ADS: &[&str] = &[
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerJoyrides.mp4",
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerMeltdowns.mp4",
];

const DEFAULT_MID_ROLL_ADS: &[&str] = &[
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerEscapes.mp4",
];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub player: PlayerConfig,
    pub ads: AdsConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load a JSON config file; missing fields fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make timers spin or ads never finish
    pub fn validate(&self) -> Result<()> {
        if self.ads.mid_roll_interval_secs == 0 {
            return Err(Error::InvalidConfig("ads.mid_roll_interval_secs must be > 0".into()));
        }
        if self.ads.progress_poll_ms == 0 {
            return Err(Error::InvalidConfig("ads.progress_poll_ms must be > 0".into()));
        }
        if self.ads.ad_duration_secs <= 0.0 {
            return Err(Error::InvalidConfig("ads.ad_duration_secs must be positive".into()));
        }
        if self.api.timeout_ms == 0 {
            return Err(Error::InvalidConfig("api.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Channel list API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub channels_endpoint: String,
    /// Headers sent to the API and injected into every player request
    pub headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl ApiConfig {
    /// Full channel list URL
    pub fn channels_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.channels_endpoint
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Referer".to_string(), "https://www.jiotv.com/".to_string());
        headers.insert(
            "User-Agent".to_string(),
            "plaYtv/7.1.5 (Linux;Android 13) ExoPlayerLib/2.11.6".to_string(),
        );

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            channels_endpoint: "/api/channels".to_string(),
            headers,
            timeout_ms: 15_000,
        }
    }
}

/// Options passed through to the external adaptive player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Seconds of media to buffer ahead
    pub buffering_goal: f64,
    /// Seconds of media required before resuming after a stall
    pub rebuffering_goal: f64,
    pub low_latency: bool,
    pub abr_enabled: bool,
    /// Initial bandwidth estimate in bps
    pub default_bandwidth: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub manifest_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffering_goal: 15.0,
            rebuffering_goal: 3.0,
            low_latency: true,
            abr_enabled: true,
            default_bandwidth: 2_000_000,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            manifest_timeout_ms: 10_000,
        }
    }
}

/// How mid-roll breaks are scheduled during main playback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidRollPolicy {
    /// Fire when the player's position crosses a new multiple of the interval.
    /// Paused playback never triggers a break and seeking back never repeats one.
    #[default]
    PlaybackPosition,
    /// Fire after each interval of wall-clock time spent playing main content
    WallClock,
}

/// Ad URLs per slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdServers {
    pub pre_roll: Vec<Url>,
    pub mid_roll: Vec<Url>,
}

impl Default for AdServers {
    fn default() -> Self {
        let parse = |urls: &[&str]| urls.iter().filter_map(|u| Url::parse(u).ok()).collect();
        Self {
            pre_roll: parse(DEFAULT_PRE_ROLL_ADS),
            mid_roll: parse(DEFAULT_MID_ROLL_ADS),
        }
    }
}

/// Optional beacon endpoints for ad tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingUrls {
    pub impression: Option<Url>,
    pub skip: Option<Url>,
    pub complete: Option<Url>,
}

/// Ad sequencing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsConfig {
    pub enabled: bool,
    pub pre_roll: bool,
    pub mid_roll: bool,
    /// Seconds counted down before an ad starts
    pub countdown_secs: u32,
    /// Seconds of ad playback before skip is accepted
    pub skip_delay_secs: u32,
    pub ad_duration_secs: f64,
    pub mid_roll_interval_secs: u64,
    pub mid_roll_policy: MidRollPolicy,
    /// Ad progress polling period in milliseconds
    pub progress_poll_ms: u64,
    pub servers: AdServers,
    pub tracking: TrackingUrls,
    /// Insert a banner slot after this many catalog entries (0 = never)
    pub banner_every: usize,
}

impl AdsConfig {
    pub fn pre_roll_enabled(&self) -> bool {
        self.enabled && self.pre_roll && !self.servers.pre_roll.is_empty()
    }

    pub fn mid_roll_enabled(&self) -> bool {
        self.enabled && self.mid_roll && !self.servers.mid_roll.is_empty()
    }

    pub fn mid_roll_interval(&self) -> Duration {
        Duration::from_secs(self.mid_roll_interval_secs)
    }

    pub fn progress_poll(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pre_roll: true,
            mid_roll: true,
            countdown_secs: 3,
            skip_delay_secs: 5,
            ad_duration_secs: 30.0,
            mid_roll_interval_secs: 300,
            mid_roll_policy: MidRollPolicy::default(),
            progress_poll_ms: 100,
            servers: AdServers::default(),
            tracking: TrackingUrls::default(),
            banner_every: 6,
        }
    }
}

/// Front-end interaction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Quiet period for search input in milliseconds
    pub debounce_ms: u64,
}

impl UiConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}
