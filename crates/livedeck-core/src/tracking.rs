//! Ad tracking event emission
//!
//! Captures ad lifecycle events for:
//! - Impression counting
//! - Skip and completion rates
//! - Optional beacon delivery to a tracking endpoint

use crate::ads::{Ad, AdKind};
use crate::config::TrackingUrls;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Ad lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdTrackingEvent {
    /// Ad started playing
    Impression,
    /// Viewer skipped the ad
    Skip,
    /// Ad played to the end
    Complete,
}

/// Tracking event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdTrackingRecord {
    /// Unique record ID
    pub id: Uuid,
    /// Sequence number
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub ad_id: String,
    #[serde(rename = "type")]
    pub kind: AdKind,
    pub event: AdTrackingEvent,
    pub channel_id: String,
    pub user_id: String,
}

/// Ad tracker
pub struct AdTracker {
    /// Event sequence counter
    sequence: RwLock<u64>,
    /// Record buffer
    buffer: RwLock<Vec<AdTrackingRecord>>,
    /// Maximum buffer size before flush
    max_buffer_size: usize,
    /// Record channel for async processing
    event_tx: mpsc::Sender<AdTrackingRecord>,
}

impl AdTracker {
    /// Create a tracker that logs records and posts them to the configured beacons.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(urls: TrackingUrls) -> Self {
        let (event_tx, mut event_rx) = mpsc::channel::<AdTrackingRecord>(1000);

        // Spawn background processor
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            while let Some(record) = event_rx.recv().await {
                debug!(
                    ad_id = %record.ad_id,
                    event = ?record.event,
                    channel_id = %record.channel_id,
                    "Ad event"
                );

                let beacon = match record.event {
                    AdTrackingEvent::Impression => urls.impression.as_ref(),
                    AdTrackingEvent::Skip => urls.skip.as_ref(),
                    AdTrackingEvent::Complete => urls.complete.as_ref(),
                };

                if let Some(url) = beacon {
                    if let Err(e) = client.post(url.clone()).json(&record).send().await {
                        warn!(error = %e, url = %url, "Ad beacon failed");
                    }
                }
            }
        });

        Self {
            sequence: RwLock::new(0),
            buffer: RwLock::new(Vec::new()),
            max_buffer_size: 50,
            event_tx,
        }
    }

    /// Record an ad event
    pub async fn track(&self, event: AdTrackingEvent, ad: &Ad, channel_id: &str) {
        let mut seq = self.sequence.write().await;
        *seq += 1;
        let sequence = *seq;
        drop(seq);

        let record = AdTrackingRecord {
            id: Uuid::new_v4(),
            sequence,
            timestamp: Utc::now(),
            ad_id: ad.id.clone(),
            kind: ad.kind,
            event,
            channel_id: channel_id.to_string(),
            user_id: "anonymous".to_string(),
        };

        // Add to buffer
        let mut buffer = self.buffer.write().await;
        buffer.push(record.clone());

        // Flush if buffer is full
        if buffer.len() >= self.max_buffer_size {
            let flushed = buffer.drain(..).count();
            info!(count = flushed, "Flushed ad tracking buffer");
        }
        drop(buffer);

        // Hand off for logging and beacon delivery
        if self.event_tx.try_send(record).is_err() {
            warn!("Ad tracking queue full, dropping record");
        }
    }

    /// Get all buffered records
    pub async fn records(&self) -> Vec<AdTrackingRecord> {
        self.buffer.read().await.clone()
    }

    /// Count buffered records of one event type
    pub async fn count(&self, event: AdTrackingEvent) -> usize {
        self.buffer
            .read()
            .await
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Clear buffer
    pub async fn clear(&self) {
        self.buffer.write().await.clear();
    }
}

impl Default for AdTracker {
    fn default() -> Self {
        Self::new(TrackingUrls::default())
    }
}
