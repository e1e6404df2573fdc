//! Players used when running without a screen
//!
//! The main player fetches the manifest through the channel's request
//! filter and reports elapsed playing time as its position. The ad player
//! only keeps time.

use async_trait::async_trait;
use livedeck_core::{
    AdPlayer, Error, HttpRequest, MediaPlayer, PlayerOptions, RequestFilter, RequestType, Result,
};
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Tracks how long something has been playing, excluding pauses
#[derive(Debug, Default)]
struct PlayClock {
    played: Duration,
    since: Option<Instant>,
}

impl PlayClock {
    fn start(&mut self) {
        if self.since.is_none() {
            self.since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(since) = self.since.take() {
            self.played += since.elapsed();
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn seconds(&self) -> f64 {
        let running = self.since.map(|s| s.elapsed()).unwrap_or_default();
        (self.played + running).as_secs_f64()
    }
}

/// Main player that validates the stream and keeps a playback clock
pub struct HeadlessPlayer {
    client: Client,
    filter: Option<RequestFilter>,
    loaded: Option<Url>,
    clock: PlayClock,
}

impl HeadlessPlayer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            filter: None,
            loaded: None,
            clock: PlayClock::default(),
        })
    }

    /// Seconds of main content played since the last load
    pub fn position(&self) -> f64 {
        self.clock.seconds()
    }
}

#[async_trait]
impl MediaPlayer for HeadlessPlayer {
    async fn configure(&mut self, options: &PlayerOptions) -> Result<()> {
        if options.drm.is_configured() {
            let license = options.drm.clearkey_license()?;
            debug!(license = %license, "Clear-key license prepared");
        }
        debug!(
            buffering_goal = options.streaming.buffering_goal,
            low_latency = options.streaming.low_latency,
            "Player configured"
        );
        Ok(())
    }

    fn set_request_filter(&mut self, filter: Option<RequestFilter>) {
        self.filter = filter;
    }

    async fn load(&mut self, url: &Url) -> Result<()> {
        let mut request = HttpRequest::get(url.as_str());
        if let Some(filter) = &self.filter {
            filter.apply(RequestType::Manifest, &mut request);
        }

        let uri = request
            .uris
            .first()
            .ok_or_else(|| Error::Internal("request has no URI".into()))?;
        let mut builder = self.client.get(uri.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::player(1002, format!("HTTP_ERROR: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::player(1001, format!("BAD_HTTP_STATUS: {status}")));
        }

        let manifest = response
            .bytes()
            .await
            .map_err(|e| Error::player(1002, format!("HTTP_ERROR: {e}")))?;
        info!(url = %url, bytes = manifest.len(), "Manifest fetched");

        self.loaded = Some(url.clone());
        self.clock.reset();
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.loaded = None;
        self.clock.reset();
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            return Err(Error::player(7000, "NOTHING_LOADED"));
        }
        self.clock.start();
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.clock.pause();
        Ok(())
    }
}

/// Ad player whose position is wall-clock time since it started
#[derive(Debug, Default)]
pub struct HeadlessAdPlayer {
    source: Option<Url>,
    clock: PlayClock,
}

#[async_trait]
impl AdPlayer for HeadlessAdPlayer {
    async fn load(&mut self, url: &Url) -> Result<()> {
        self.source = Some(url.clone());
        self.clock.reset();
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::AdPlayback("no ad loaded".into()));
        }
        self.clock.start();
        Ok(())
    }

    fn position(&self) -> f64 {
        self.clock.seconds()
    }

    async fn stop(&mut self) {
        self.source = None;
        self.clock.reset();
    }
}
