//! Integration tests for Livedeck Core

use async_trait::async_trait;
use livedeck_core::{
    AdEvent, AdPlayer, AdTrackingEvent, AdsConfig, ApiConfig, AppConfig, Channel, ChannelCatalog,
    ChannelClient, Debouncer, Error, HttpRequest, MediaPlayer, PlaybackSequencer, PlaybackState,
    PlayerEvent, PlayerOptions, RequestFilter, RequestType, Result, SequencerEvent,
};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio_test::{assert_err, assert_ok};
use url::Url;

// =============================================================================
// Test Players
// =============================================================================

#[derive(Default)]
struct RecordingPlayer {
    loads: Vec<Url>,
    options: Option<PlayerOptions>,
    filter: Option<RequestFilter>,
}

#[async_trait]
impl MediaPlayer for RecordingPlayer {
    async fn configure(&mut self, options: &PlayerOptions) -> Result<()> {
        self.options = Some(options.clone());
        Ok(())
    }

    fn set_request_filter(&mut self, filter: Option<RequestFilter>) {
        self.filter = filter;
    }

    async fn load(&mut self, url: &Url) -> Result<()> {
        self.loads.push(url.clone());
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        // Autoplay blocked until the viewer interacts
        Err(Error::player(7000, "NotAllowedError"))
    }

    async fn pause(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SilentAdPlayer;

#[async_trait]
impl AdPlayer for SilentAdPlayer {
    async fn load(&mut self, _url: &Url) -> Result<()> {
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> f64 {
        0.0
    }

    async fn stop(&mut self) {}
}

async fn wait_for(rx: &mut watch::Receiver<PlaybackState>, f: impl FnMut(&PlaybackState) -> bool) {
    tokio::time::timeout(Duration::from_secs(900), rx.wait_for(f))
        .await
        .expect("timed out waiting for state")
        .expect("sequencer dropped");
}

// =============================================================================
// Channel List Tests
// =============================================================================

/// Canned channel list response plus the headers of the first request
struct ChannelFixture {
    status: StatusCode,
    body: &'static str,
    headers: Mutex<Option<oneshot::Sender<HeaderMap>>>,
}

async fn channel_list(
    State(fixture): State<Arc<ChannelFixture>>,
    headers: HeaderMap,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    if let Some(tx) = fixture.headers.lock().unwrap().take() {
        let _ = tx.send(headers);
    }
    (
        fixture.status,
        [(header::CONTENT_TYPE, "application/json")],
        fixture.body,
    )
}

/// Serve the channel list endpoint on a local port
async fn serve_channels(
    status: StatusCode,
    body: &'static str,
) -> (ApiConfig, oneshot::Receiver<HeaderMap>) {
    let (tx, rx) = oneshot::channel();
    let fixture = Arc::new(ChannelFixture {
        status,
        body,
        headers: Mutex::new(Some(tx)),
    });
    let app = Router::new()
        .route("/api/channels", get(channel_list))
        .with_state(fixture);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .unwrap_or_else(|e| panic!("server error: {e}"));
    });

    let api = ApiConfig {
        base_url: format!("http://{addr}"),
        ..Default::default()
    };
    (api, rx)
}

#[tokio::test]
async fn test_fetch_channels() {
    let body = r#"{"success": true, "data": [
        {"id": 143, "title": "Star Sports 1", "url": "https://cdn.example.com/ss1.mpd", "category": "Sports", "key": "abc:def"},
        {"id": "7", "title": "NDTV 24x7", "url": "https://cdn.example.com/ndtv.m3u8", "category": "News"},
        {"title": "broken"}
    ]}"#;
    let (api, headers) = serve_channels(StatusCode::OK, body).await;

    let client = assert_ok!(ChannelClient::new(&api));
    assert!(client.url().ends_with("/api/channels"));

    let channels = assert_ok!(client.fetch_channels().await);
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].id, "143");
    assert!(channels[0].clear_key().is_some());

    let headers = headers.await.unwrap();
    assert_eq!(headers[header::REFERER], "https://www.jiotv.com/");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_fetch_channels_http_error() {
    let (api, _request) = serve_channels(StatusCode::INTERNAL_SERVER_ERROR, "{}").await;
    let client = ChannelClient::new(&api).unwrap();

    let err = assert_err!(client.fetch_channels().await);
    assert!(matches!(err, Error::HttpStatus { status: 500 }));
    assert!(err.is_recoverable());
    assert_eq!(err.friendly_message(), "Failed to load channels. Please try again.");
}

#[tokio::test]
async fn test_fetch_channels_bad_body() {
    let (api, _request) = serve_channels(StatusCode::OK, r#"{"success": false}"#).await;
    let client = ChannelClient::new(&api).unwrap();
    assert!(matches!(client.fetch_channels().await, Err(Error::InvalidResponse(_))));
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_debounced_search() {
    let catalog = ChannelCatalog::new(vec![
        Channel::new("1", "Star Sports 1", "https://x/1.mpd").with_category("Sports"),
        Channel::new("2", "NDTV", "https://x/2.mpd").with_category("News"),
    ]);
    let (debouncer, mut queries) = Debouncer::new(AppConfig::default().ui.debounce());

    for query in ["n", "nd", "ndt"] {
        debouncer.submit(query.to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let query = queries.recv().await.unwrap();
    let results = catalog.search(&query);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "NDTV");
    assert_eq!(ChannelCatalog::grouped(&results)[0].0, "News");
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("livedeck-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, r#"{"ads": {"countdown_secs": 5, "mid_roll_policy": "wall_clock"}}"#).unwrap();

    let config = assert_ok!(AppConfig::from_file(&path));
    assert_eq!(config.ads.countdown_secs, 5);
    assert_eq!(config.ads.skip_delay_secs, 5);
    assert_eq!(config.api.timeout_ms, 15_000);

    std::fs::write(&path, r#"{"ads": {"progress_poll_ms": 0}}"#).unwrap();
    assert!(matches!(AppConfig::from_file(&path), Err(Error::InvalidConfig(_))));

    std::fs::remove_file(&path).ok();
}

// =============================================================================
// Sequencer Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_select_channel_end_to_end() {
    let mut sequencer = assert_ok!(PlaybackSequencer::new(
        AppConfig::default(),
        RecordingPlayer::default(),
        SilentAdPlayer,
    ));
    let mut state = sequencer.subscribe_state();

    let channel = Channel::new("1", "A", "https://x/a.mpd")
        .with_key("00112233445566778899aabbccddeeff:ffeeddccbbaa99887766554433221100")
        .with_cookie("__hdnea__=exp=1700000000~hmac=abc; Path=/");
    sequencer.select_channel(channel).await;

    wait_for(&mut state, |s| matches!(s, PlaybackState::PreRollCountdown { remaining: 3, .. })).await;
    wait_for(&mut state, |s| matches!(s, PlaybackState::PreRollPlaying { .. })).await;
    assert!(!sequencer.skip());

    wait_for(&mut state, |s| s.can_skip()).await;
    assert!(sequencer.skip());

    // Blocked autoplay still counts as loaded
    wait_for(&mut state, |s| matches!(s, PlaybackState::MainPlaying { .. })).await;
    assert_eq!(sequencer.tracker().count(AdTrackingEvent::Skip).await, 1);

    let player = sequencer.player();
    let player = player.lock().await;
    assert_eq!(player.loads, vec![Url::parse("https://x/a.mpd").unwrap()]);

    let options = player.options.as_ref().unwrap();
    assert_eq!(options.streaming.buffering_goal, 15.0);
    let license: serde_json::Value = serde_json::from_str(&options.drm.clearkey_license().unwrap()).unwrap();
    assert_eq!(license["keys"][0]["kid"], "ABEiM0RVZneImaq7zN3u_w");
    assert_eq!(license["keys"][0]["k"], "_-7dzLuqmYh3ZlVEMyIRAA");

    let filter = player.filter.as_ref().unwrap();
    let mut segment = HttpRequest::get("https://x/seg-1.m4s?bw=800");
    filter.apply(RequestType::Segment, &mut segment);
    assert_eq!(segment.uris[0], "https://x/seg-1.m4s?bw=800&__hdnea__=exp=1700000000~hmac=abc");
    assert_eq!(
        segment.headers.get("Cookie").map(String::as_str),
        Some("__hdnea__=exp=1700000000~hmac=abc; Path=/")
    );
}

#[tokio::test(start_paused = true)]
async fn test_rapid_channel_switching() {
    let mut sequencer = assert_ok!(PlaybackSequencer::new(
        AppConfig::default(),
        RecordingPlayer::default(),
        SilentAdPlayer,
    ));
    let mut state = sequencer.subscribe_state();
    let mut events = sequencer.subscribe_events();

    for id in ["1", "2", "3", "4"] {
        sequencer
            .select_channel(Channel::new(id, id, format!("https://x/{id}.mpd")))
            .await;
        tokio::time::sleep(Duration::from_millis(700)).await;
    }

    wait_for(&mut state, |s| matches!(s, PlaybackState::PreRollPlaying { .. })).await;
    sequencer.ad_event(AdEvent::Ended);
    wait_for(&mut state, |s| matches!(s, PlaybackState::MainPlaying { .. })).await;
    sequencer.player_event(PlayerEvent::TimeUpdate { position: 1.0 });
    tokio::time::sleep(Duration::from_secs(30)).await;

    let mut live = None;
    let mut ended = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SequencerEvent::SessionStarted { session, .. } => {
                assert!(live.is_none(), "two sessions alive at once");
                live = Some(session);
            }
            SequencerEvent::SessionEnded { session } => {
                assert_eq!(live, Some(session));
                live = None;
                ended += 1;
            }
            SequencerEvent::StateChanged { session, .. } => assert_eq!(live, Some(session)),
        }
    }
    assert_eq!(ended, 3);

    let player = sequencer.player();
    let loads = player.lock().await.loads.clone();
    assert_eq!(loads, vec![Url::parse("https://x/4.mpd").unwrap()]);
}

#[tokio::test(start_paused = true)]
async fn test_ads_disabled_loads_immediately() {
    let config = AppConfig {
        ads: AdsConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut sequencer = assert_ok!(PlaybackSequencer::new(
        config,
        RecordingPlayer::default(),
        SilentAdPlayer
    ));
    let mut events = sequencer.subscribe_events();

    let session = sequencer.select_channel(Channel::new("9", "Nine", "https://x/9.m3u8")).await;

    assert_eq!(
        events.recv().await.unwrap(),
        SequencerEvent::SessionStarted {
            session,
            channel_id: "9".into()
        }
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        SequencerEvent::StateChanged { state: PlaybackState::MainLoading { .. }, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        SequencerEvent::StateChanged { state: PlaybackState::MainPlaying { .. }, .. }
    ));

    sequencer.teardown().await;
    assert_eq!(events.recv().await.unwrap(), SequencerEvent::SessionEnded { session });
    assert_eq!(sequencer.state(), PlaybackState::Idle);
}
