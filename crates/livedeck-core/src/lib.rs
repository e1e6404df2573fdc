//! Livedeck Core - Playback Library for Live TV Channels
//!
//! This crate provides the core functionality behind a live TV front end:
//! - Channel list fetching, search and category grouping
//! - Clear-key DRM configuration per channel
//! - Per-channel request filtering (headers, cookies, CDN tokens)
//! - Pre-roll / mid-roll ad sequencing around the main stream
//! - Ad tracking event emission
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Livedeck Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Channel    │  │   Request    │  │     DRM      │          │
//! │  │   Catalog    │  │   Filter     │  │   Config     │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │  Sequencer  │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │  Ad Tracker  │  │ MediaPlayer │  │   AdPlayer   │           │
//! │  │              │  │   (trait)   │  │   (trait)    │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod ads;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod drm;
pub mod error;
pub mod filter;
pub mod player;
pub mod sequencer;
pub mod tracking;
pub mod types;

pub use ads::{Ad, AdKind};
pub use catalog::{CatalogEntry, ChannelCatalog, ChannelClient, Debouncer};
pub use channel::{Channel, ClearKey};
pub use config::{AdsConfig, ApiConfig, AppConfig, MidRollPolicy, PlayerConfig, UiConfig};
pub use drm::DrmConfig;
pub use error::{Error, PlayerErrorCategory, Result};
pub use filter::{HttpRequest, RequestFilter, RequestType};
pub use player::{AdEvent, AdPlayer, MediaPlayer, PlayerEvent, PlayerOptions};
pub use sequencer::PlaybackSequencer;
pub use tracking::{AdTracker, AdTrackingEvent, AdTrackingRecord};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Livedeck Core initialized");
}
