//! Playback Sequencer - drives ads and main content for the selected channel
//!
//! Each channel selection creates a session: one task that owns every timer
//! of that selection (ad countdowns, skip counters, progress polling and
//! mid-roll scheduling). All of them wait on the session's cancellation
//! token, so tearing a session down stops them at once and no callback of an
//! old channel can act on the new one.
//!
//! ```text
//!  select_channel ──► [PreRollCountdown] ──► [PreRollPlaying] ──┐
//!                                                               ▼
//!        retry ──────────────────────────────────────────► [MainLoading]
//!          ▲                                                    │
//!      [Failed] ◄───────────────────────────────────────────────┤
//!          ▲                                                    ▼
//!          └──────────── [MidRollPlaying] ◄── [MidRollCountdown] ◄── [MainPlaying]
//! ```

use crate::{
    ads::{Ad, AdKind},
    channel::Channel,
    config::{AppConfig, MidRollPolicy},
    error::{Error, Result},
    filter::RequestFilter,
    player::{AdEvent, AdPlayer, MediaPlayer, PlayerEvent, PlayerOptions},
    tracking::{AdTracker, AdTrackingEvent},
    types::{PlaybackFailure, PlaybackState, SequencerEvent, SessionId},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use url::Url;

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Wait for the next tick, or forever when there is no timer
async fn tick(clock: &mut Option<Interval>) {
    match clock {
        Some(clock) => {
            clock.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Input routed from the front end or the players into the running session
#[derive(Debug)]
enum SessionInput {
    Skip,
    Retry,
    Player(PlayerEvent),
    Ad(AdEvent),
}

/// Why a session step stopped early
#[derive(Debug)]
enum Interrupt {
    /// The session was torn down
    Cancelled,
    /// Main content failed; the session waits for a retry
    Failed(Error),
}

impl From<Error> for Interrupt {
    fn from(error: Error) -> Self {
        Interrupt::Failed(error)
    }
}

/// How an ad left the screen
#[derive(Debug)]
enum AdOutcome {
    Completed,
    Skipped,
    Failed(String),
}

/// Handle to the running session
struct ActiveSession {
    id: SessionId,
    channel: Channel,
    token: CancellationToken,
    input: mpsc::UnboundedSender<SessionInput>,
    task: JoinHandle<()>,
}

/// Sequences pre-roll ads, main content and mid-roll ads for one channel at
/// a time.
///
/// Observers follow progress through [`subscribe_state`](Self::subscribe_state)
/// (latest state, including ad progress) and
/// [`subscribe_events`](Self::subscribe_events) (session lifecycle and every
/// state transition).
pub struct PlaybackSequencer<P: MediaPlayer, A: AdPlayer> {
    config: Arc<AppConfig>,
    player: Arc<Mutex<P>>,
    ad_player: Arc<Mutex<A>>,
    tracker: Arc<AdTracker>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    events_tx: broadcast::Sender<SequencerEvent>,
    session: Option<ActiveSession>,
}

impl<P: MediaPlayer, A: AdPlayer> PlaybackSequencer<P, A> {
    /// Create a sequencer driving the given players.
    ///
    /// Must be called from within a tokio runtime. Fails if the
    /// configuration does not validate.
    pub fn new(config: AppConfig, player: P, ad_player: A) -> Result<Self> {
        config.validate()?;
        let tracker = Arc::new(AdTracker::new(config.ads.tracking.clone()));
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (events_tx, _) = broadcast::channel(256);

        Ok(Self {
            config: Arc::new(config),
            player: Arc::new(Mutex::new(player)),
            ad_player: Arc::new(Mutex::new(ad_player)),
            tracker,
            state_tx: Arc::new(state_tx),
            events_tx,
            session: None,
        })
    }

    /// Get current state
    pub fn state(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to session and transition events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SequencerEvent> {
        self.events_tx.subscribe()
    }

    /// Configuration shared with every session
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the main content player
    pub fn player(&self) -> Arc<Mutex<P>> {
        self.player.clone()
    }

    /// Handle to the ad player
    pub fn ad_player(&self) -> Arc<Mutex<A>> {
        self.ad_player.clone()
    }

    /// Ad tracker shared by all sessions
    pub fn tracker(&self) -> Arc<AdTracker> {
        self.tracker.clone()
    }

    /// Channel of the running session
    pub fn current_channel(&self) -> Option<&Channel> {
        self.session.as_ref().map(|s| &s.channel)
    }

    /// ID of the running session
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Select a channel.
    ///
    /// The previous session is torn down completely before the new one
    /// starts. Selecting the channel that is already playing is a no-op
    /// unless it has failed.
    #[instrument(skip(self, channel), fields(channel_id = %channel.id))]
    pub async fn select_channel(&mut self, channel: Channel) -> SessionId {
        if let Some(active) = &self.session {
            let failed = matches!(*self.state_tx.borrow(), PlaybackState::Failed { .. });
            if active.channel.id == channel.id && !failed {
                debug!("Channel already selected");
                return active.id;
            }
        }

        self.end_session().await;

        let id = SessionId::new();
        let token = CancellationToken::new();
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        info!(session_id = %id, title = %channel.title, "Starting session");
        let _ = self.events_tx.send(SequencerEvent::SessionStarted {
            session: id,
            channel_id: channel.id.clone(),
        });

        let runner = SessionRunner {
            id,
            channel: channel.clone(),
            config: self.config.clone(),
            player: self.player.clone(),
            ad_player: self.ad_player.clone(),
            tracker: self.tracker.clone(),
            state_tx: self.state_tx.clone(),
            events_tx: self.events_tx.clone(),
            token: token.clone(),
            input: input_rx,
            position_boundary: None,
        };

        let span = info_span!("session", session_id = %id, channel_id = %channel.id);
        let task = tokio::spawn(runner.run().instrument(span));

        self.session = Some(ActiveSession {
            id,
            channel,
            token,
            input: input_tx,
            task,
        });

        id
    }

    /// Ask to skip the current ad.
    ///
    /// Returns true if the ad was skippable when the request was made.
    /// Requests during a countdown or before the skip delay has run out are
    /// ignored.
    pub fn skip(&self) -> bool {
        let skippable = self.state_tx.borrow().can_skip();
        if skippable {
            self.send(SessionInput::Skip);
        } else {
            debug!("Skip ignored, ad not skippable yet");
        }
        skippable
    }

    /// Retry main content after a failure. The pre-roll is not replayed.
    ///
    /// Only accepted while the session is `Failed`.
    pub fn retry(&self) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::NoActiveSession);
        }
        let state = self.state_tx.borrow().clone();
        if !matches!(state, PlaybackState::Failed { .. }) {
            debug!(%state, "Retry ignored, session has not failed");
            return Err(Error::NothingToRetry(state.to_string()));
        }
        self.send(SessionInput::Retry);
        Ok(())
    }

    /// Forward an event from the adaptive player
    pub fn player_event(&self, event: PlayerEvent) {
        self.send(SessionInput::Player(event));
    }

    /// Forward an event from the ad player
    pub fn ad_event(&self, event: AdEvent) {
        self.send(SessionInput::Ad(event));
    }

    /// Stop everything and return to idle
    #[instrument(skip(self))]
    pub async fn teardown(&mut self) {
        self.end_session().await;
    }

    fn send(&self, input: SessionInput) {
        match &self.session {
            Some(session) => {
                if session.input.send(input).is_err() {
                    debug!(session_id = %session.id, "Session no longer accepts input");
                }
            }
            None => debug!(?input, "No active session"),
        }
    }

    /// Cancel the session, wait for its task, then release both players
    async fn end_session(&mut self) {
        let Some(ActiveSession {
            id, token, input, task, ..
        }) = self.session.take()
        else {
            return;
        };

        token.cancel();
        drop(input);

        if let Err(e) = task.await {
            error!(session_id = %id, error = %e, "Session task failed");
        }

        self.ad_player.lock().await.stop().await;
        if let Err(e) = self.player.lock().await.unload().await {
            warn!(session_id = %id, error = %e, "Failed to unload player");
        }

        info!(session_id = %id, "Session ended");
        let _ = self.events_tx.send(SequencerEvent::SessionEnded { session: id });
        self.state_tx.send_replace(PlaybackState::Idle);
    }
}

impl<P: MediaPlayer, A: AdPlayer> Drop for PlaybackSequencer<P, A> {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.token.cancel();
        }
    }
}

/// The task behind one session
struct SessionRunner<P: MediaPlayer, A: AdPlayer> {
    id: SessionId,
    channel: Channel,
    config: Arc<AppConfig>,
    player: Arc<Mutex<P>>,
    ad_player: Arc<Mutex<A>>,
    tracker: Arc<AdTracker>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    events_tx: broadcast::Sender<SequencerEvent>,
    token: CancellationToken,
    input: mpsc::UnboundedReceiver<SessionInput>,
    /// Highest mid-roll boundary already served, set by the first position
    /// report after each load
    position_boundary: Option<u64>,
}

impl<P: MediaPlayer, A: AdPlayer> SessionRunner<P, A> {
    async fn run(mut self) {
        if self.config.ads.pre_roll_enabled() {
            if let Err(Interrupt::Cancelled) = self.ad_break(AdKind::PreRoll).await {
                debug!("Cancelled during pre-roll");
                return;
            }
        }

        loop {
            let interrupt = match self.load_main().await {
                Ok(()) => self.play_main().await,
                Err(interrupt) => interrupt,
            };

            match interrupt {
                Interrupt::Cancelled => break,
                Interrupt::Failed(error) => {
                    self.fail(&error);
                    if self.wait_for_retry().await.is_err() {
                        break;
                    }
                    info!("Retrying main content");
                }
            }
        }

        debug!("Session task finished");
    }

    fn set_state(&self, state: PlaybackState) {
        if self.token.is_cancelled() {
            return;
        }

        let allowed = self.state_tx.borrow().can_transition_to(&state);
        if !allowed {
            warn!(to = %state, "Unexpected state transition");
        }

        debug!(state = %state, "State transition");
        self.state_tx.send_replace(state.clone());
        let _ = self.events_tx.send(SequencerEvent::StateChanged {
            session: self.id,
            state,
        });
    }

    fn check_cancelled(&self) -> std::result::Result<(), Interrupt> {
        if self.token.is_cancelled() {
            Err(Interrupt::Cancelled)
        } else {
            Ok(())
        }
    }

    fn fail(&self, error: &Error) {
        warn!(code = error.error_code(), error = %error, "Main content failed");
        self.set_state(PlaybackState::Failed {
            channel_id: self.channel.id.clone(),
            failure: PlaybackFailure::from(error),
        });
    }

    /// Countdown followed by one ad. Ad problems never fail the session.
    async fn ad_break(&mut self, kind: AdKind) -> std::result::Result<(), Interrupt> {
        let Some(ad) = Ad::choose(kind, &self.config.ads) else {
            debug!(%kind, "No ad available");
            return Ok(());
        };

        self.countdown(kind).await?;
        self.play_ad(ad).await
    }

    async fn countdown(&mut self, kind: AdKind) -> std::result::Result<(), Interrupt> {
        let mut remaining = self.config.ads.countdown_secs;
        self.set_state(PlaybackState::countdown(kind, &self.channel.id, remaining));

        let mut ticker = interval_at(Instant::now() + ONE_SECOND, ONE_SECOND);
        while remaining > 0 {
            tokio::select! {
                _ = self.token.cancelled() => return Err(Interrupt::Cancelled),
                _ = ticker.tick() => {
                    remaining -= 1;
                    self.set_state(PlaybackState::countdown(kind, &self.channel.id, remaining));
                }
                input = self.input.recv() => match input {
                    None => return Err(Interrupt::Cancelled),
                    Some(input) => debug!(?input, "Ignored during ad countdown"),
                },
            }
        }

        Ok(())
    }

    #[instrument(skip(self, ad), fields(ad_id = %ad.id, kind = %ad.kind))]
    async fn play_ad(&mut self, ad: Ad) -> std::result::Result<(), Interrupt> {
        let started = {
            let mut ad_player = self.ad_player.lock().await;
            match ad_player.load(&ad.url).await {
                Ok(()) => ad_player.play().await,
                Err(e) => Err(e),
            }
        };
        self.check_cancelled()?;

        if let Err(e) = started {
            warn!(url = %ad.url, error = %e, "Ad failed to start, continuing to content");
            self.ad_player.lock().await.stop().await;
            return Ok(());
        }

        info!(url = %ad.url, "Ad started");
        self.tracker
            .track(AdTrackingEvent::Impression, &ad, &self.channel.id)
            .await;

        let mut skip_remaining = self.config.ads.skip_delay_secs;
        let mut position = 0.0;
        self.set_state(PlaybackState::ad_playing(
            &self.channel.id,
            ad.clone(),
            skip_remaining,
            position,
        ));

        let poll = self.config.ads.progress_poll();
        let mut skip_ticker = interval_at(Instant::now() + ONE_SECOND, ONE_SECOND);
        let mut progress = interval_at(Instant::now() + poll, poll);

        let outcome = loop {
            tokio::select! {
                _ = self.token.cancelled() => return Err(Interrupt::Cancelled),
                _ = skip_ticker.tick(), if skip_remaining > 0 => {
                    skip_remaining -= 1;
                    self.set_state(PlaybackState::ad_playing(
                        &self.channel.id,
                        ad.clone(),
                        skip_remaining,
                        position,
                    ));
                }
                _ = progress.tick() => {
                    position = self.ad_player.lock().await.position();
                    if ad.is_complete_at(position) {
                        break AdOutcome::Completed;
                    }
                    // Progress only refreshes the latest state; it is not a transition
                    if !self.token.is_cancelled() {
                        self.state_tx.send_replace(PlaybackState::ad_playing(
                            &self.channel.id,
                            ad.clone(),
                            skip_remaining,
                            position,
                        ));
                    }
                }
                input = self.input.recv() => match input {
                    None => return Err(Interrupt::Cancelled),
                    Some(SessionInput::Skip) if skip_remaining == 0 => break AdOutcome::Skipped,
                    Some(SessionInput::Skip) => debug!(skip_remaining, "Skip ignored"),
                    Some(SessionInput::Ad(AdEvent::Ended)) => break AdOutcome::Completed,
                    Some(SessionInput::Ad(AdEvent::Error { message })) => {
                        break AdOutcome::Failed(message)
                    }
                    Some(input) => debug!(?input, "Ignored during ad"),
                },
            }
        };

        match &outcome {
            AdOutcome::Completed => {
                self.tracker
                    .track(AdTrackingEvent::Complete, &ad, &self.channel.id)
                    .await;
            }
            AdOutcome::Skipped => {
                self.tracker
                    .track(AdTrackingEvent::Skip, &ad, &self.channel.id)
                    .await;
            }
            AdOutcome::Failed(message) => {
                let error = Error::AdPlayback(message.clone());
                warn!(error = %error, "Ad failed, continuing to content");
            }
        }

        self.ad_player.lock().await.stop().await;
        info!(outcome = ?outcome, position, "Ad finished");
        self.check_cancelled()
    }

    /// Unload, configure, install the filter, load and autoplay the stream
    #[instrument(skip(self), fields(url = %self.channel.url))]
    async fn load_main(&mut self) -> std::result::Result<(), Interrupt> {
        self.set_state(PlaybackState::MainLoading {
            channel_id: self.channel.id.clone(),
        });
        self.position_boundary = None;

        let url = Url::parse(&self.channel.url).map_err(|source| Error::InvalidStreamUrl {
            url: self.channel.url.clone(),
            source,
        })?;

        let options = PlayerOptions::for_channel(&self.config.player, &self.channel);
        let filter = RequestFilter::for_channel(&self.channel, &self.config.api.headers);

        let mut player = self.player.lock().await;

        player.unload().await?;
        self.check_cancelled()?;

        player.configure(&options).await?;
        player.set_request_filter(Some(filter));
        self.check_cancelled()?;

        player.load(&url).await?;
        self.check_cancelled()?;

        if let Err(e) = player.play().await {
            warn!(error = %e, "Autoplay blocked, waiting for user interaction");
        }
        drop(player);
        self.check_cancelled()?;

        info!(drm = options.drm.is_configured(), "Main content loaded");
        Ok(())
    }

    /// Watch main playback until it fails or the session ends
    async fn play_main(&mut self) -> Interrupt {
        self.set_state(PlaybackState::MainPlaying {
            channel_id: self.channel.id.clone(),
        });

        let mid_roll = self.config.ads.mid_roll_enabled();
        let policy = self.config.ads.mid_roll_policy;
        let interval = self.config.ads.mid_roll_interval();
        let by_clock = mid_roll && policy == MidRollPolicy::WallClock;
        let by_position = mid_roll && policy == MidRollPolicy::PlaybackPosition;
        let mut clock = by_clock.then(|| interval_at(Instant::now() + interval, interval));

        loop {
            let due = tokio::select! {
                _ = self.token.cancelled() => return Interrupt::Cancelled,
                _ = tick(&mut clock) => true,
                input = self.input.recv() => match input {
                    None => return Interrupt::Cancelled,
                    Some(SessionInput::Player(PlayerEvent::TimeUpdate { position })) => {
                        by_position && self.crosses_boundary(position)
                    }
                    Some(SessionInput::Player(PlayerEvent::Error { code, message })) => {
                        return Interrupt::Failed(Error::player(code, message));
                    }
                    Some(SessionInput::Player(PlayerEvent::Ended)) => {
                        return Interrupt::Failed(Error::StreamEnded);
                    }
                    Some(input) => {
                        debug!(?input, "Ignored during main playback");
                        false
                    }
                },
            };

            if due {
                if let Err(interrupt) = self.mid_roll().await {
                    return interrupt;
                }
                if let Some(clock) = clock.as_mut() {
                    clock.reset();
                }
            }
        }
    }

    /// True when `position` has moved into a mid-roll interval not yet served.
    ///
    /// The first report after a load only sets the baseline, so joining a
    /// live stream far from position zero does not fire a break at once.
    fn crosses_boundary(&mut self, position: f64) -> bool {
        if !position.is_finite() || position < 0.0 {
            return false;
        }

        let interval = self.config.ads.mid_roll_interval_secs as f64;
        let boundary = (position / interval).floor() as u64;

        match self.position_boundary {
            None => {
                self.position_boundary = Some(boundary);
                false
            }
            Some(served) if boundary > served => {
                self.position_boundary = Some(boundary);
                true
            }
            Some(_) => false,
        }
    }

    async fn mid_roll(&mut self) -> std::result::Result<(), Interrupt> {
        info!("Mid-roll break");

        if let Err(e) = self.player.lock().await.pause().await {
            warn!(error = %e, "Failed to pause main content");
        }
        self.check_cancelled()?;

        self.ad_break(AdKind::MidRoll).await?;

        if let Err(e) = self.player.lock().await.play().await {
            warn!(error = %e, "Failed to resume main content");
        }
        self.check_cancelled()?;

        self.set_state(PlaybackState::MainPlaying {
            channel_id: self.channel.id.clone(),
        });
        Ok(())
    }

    async fn wait_for_retry(&mut self) -> std::result::Result<(), Interrupt> {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => return Err(Interrupt::Cancelled),
                input = self.input.recv() => match input {
                    None => return Err(Interrupt::Cancelled),
                    Some(SessionInput::Retry) => return Ok(()),
                    Some(input) => debug!(?input, "Ignored while failed"),
                },
            }
        }
    }
}
