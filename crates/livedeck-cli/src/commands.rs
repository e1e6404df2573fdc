//! CLI command implementations

use crate::headless::{HeadlessAdPlayer, HeadlessPlayer};
use crate::output::{self, CategoryRow, ChannelRow, OutputFormat, PropertyRow};
use livedeck_core::{
    AdTrackingEvent, AppConfig, CatalogEntry, Channel, ChannelCatalog, ChannelClient, DrmConfig,
    Error, HttpRequest, MidRollPolicy, PlaybackSequencer, PlaybackState, PlayerEvent,
    PlayerOptions, RequestFilter, RequestType, SequencerEvent,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{info, warn};

/// Fetch the channel list, reporting failures the way the front end does
async fn load_catalog(config: &AppConfig) -> anyhow::Result<ChannelCatalog> {
    let client = ChannelClient::new(&config.api)?;
    let channels = client.fetch_channels().await.map_err(|e| {
        let message = e.friendly_message();
        anyhow::Error::new(e).context(message)
    })?;
    Ok(ChannelCatalog::new(channels))
}

fn find_channel<'a>(catalog: &'a ChannelCatalog, id: &str) -> anyhow::Result<&'a Channel> {
    Ok(catalog
        .find(id)
        .ok_or_else(|| Error::ChannelNotFound(id.to_string()))?)
}

/// List channels, optionally filtered
pub async fn channels(
    config: &AppConfig,
    search: Option<&str>,
    category: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    let catalog = load_catalog(config).await?;

    let mut selected = catalog.search(search.unwrap_or_default());
    if let Some(category) = category {
        selected.retain(|c| c.category_or_default().eq_ignore_ascii_case(category));
    }

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&selected)?),
        OutputFormat::Table => {
            println!("{}", output::to_table(selected.iter().map(|c| ChannelRow::from(*c))));
        }
        OutputFormat::Text => {
            if selected.is_empty() {
                println!("No channels found");
                return Ok(());
            }

            for (category, members) in ChannelCatalog::grouped(&selected) {
                println!("\n{} ({})", category, members.len());
                for entry in ChannelCatalog::layout_with_banners(&members, config.ads.banner_every) {
                    match entry {
                        CatalogEntry::Channel(c) => println!("  {:>6}  {}", c.id, c.title),
                        CatalogEntry::Banner { slot } => println!("  ------  [banner ad {}]", slot + 1),
                    }
                }
            }
            println!("\n{} of {} channels", selected.len(), catalog.len());
        }
    }

    Ok(())
}

/// List categories with channel counts
pub async fn categories(config: &AppConfig, format: &str) -> anyhow::Result<()> {
    let catalog = load_catalog(config).await?;
    let all: Vec<&Channel> = catalog.channels().iter().collect();
    let rows: Vec<CategoryRow> = ChannelCatalog::grouped(&all)
        .into_iter()
        .map(|(category, members)| CategoryRow {
            category: category.to_string(),
            channels: members.len(),
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&rows)?),
        OutputFormat::Table => println!("{}", output::to_table(rows)),
        OutputFormat::Text => {
            for row in &rows {
                println!("  {:<24} {}", row.category, row.channels);
            }
        }
    }

    Ok(())
}

/// Everything the player would be given for one channel
#[derive(Serialize)]
struct ChannelReport<'a> {
    channel: &'a Channel,
    logo: String,
    drm: DrmConfig,
    license: Option<serde_json::Value>,
    manifest_url: String,
    request_headers: BTreeMap<String, String>,
    pre_roll: bool,
    mid_roll: bool,
    mid_roll_interval_secs: u64,
    mid_roll_policy: MidRollPolicy,
}

/// Show DRM, request filter and ad plan for a channel
pub async fn inspect(config: &AppConfig, id: &str, format: &str) -> anyhow::Result<()> {
    let catalog = load_catalog(config).await?;
    let channel = find_channel(&catalog, id)?;

    let options = PlayerOptions::for_channel(&config.player, channel);
    let license: Option<serde_json::Value> = if options.drm.is_configured() {
        Some(serde_json::from_str(&options.drm.clearkey_license()?)?)
    } else {
        None
    };

    let filter = RequestFilter::for_channel(channel, &config.api.headers);
    let mut request = HttpRequest::get(channel.url.clone());
    filter.apply(RequestType::Manifest, &mut request);

    let report = ChannelReport {
        channel,
        logo: channel.logo_url(),
        drm: options.drm,
        license,
        manifest_url: request.uris.first().cloned().unwrap_or_default(),
        request_headers: request.headers,
        pre_roll: config.ads.pre_roll_enabled(),
        mid_roll: config.ads.mid_roll_enabled(),
        mid_roll_interval_secs: config.ads.mid_roll_interval_secs,
        mid_roll_policy: config.ads.mid_roll_policy,
    };

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let rows = vec![
        PropertyRow::new("ID", report.channel.id.clone()),
        PropertyRow::new("Title", report.channel.title.clone()),
        PropertyRow::new("Category", report.channel.category_or_default()),
        PropertyRow::new("Logo", report.logo.clone()),
        PropertyRow::new("Clear-key", yes_no(report.drm.is_configured())),
        PropertyRow::new("Manifest URL", report.manifest_url.clone()),
        PropertyRow::new("Pre-roll", yes_no(report.pre_roll)),
        PropertyRow::new(
            "Mid-roll",
            if report.mid_roll {
                format!("every {}s ({:?})", report.mid_roll_interval_secs, report.mid_roll_policy)
            } else {
                "no".to_string()
            },
        ),
    ];

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&report)?),
        OutputFormat::Table => println!("{}", output::to_table(rows)),
        OutputFormat::Text => {
            println!("Channel inspection:");
            for row in &rows {
                println!("  {:<14} {}", row.property, row.value);
            }
            if !report.request_headers.is_empty() {
                println!("\nManifest request headers:");
                for (name, value) in &report.request_headers {
                    println!("  {name}: {value}");
                }
            }
        }
    }

    Ok(())
}

fn print_event(event: &SequencerEvent, elapsed: Duration, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Text | OutputFormat::Table => {
            println!("{}", output::event_line(event, elapsed.as_secs_f64()));
            if let SequencerEvent::StateChanged {
                state: PlaybackState::Failed { failure, .. },
                ..
            } = event
            {
                println!("           {} ({})", failure.message, failure.details);
            }
        }
    }
    Ok(())
}

/// Run a headless playback session
pub async fn play(
    config: AppConfig,
    id: &str,
    duration: u64,
    skip_ads: bool,
    format: &str,
) -> anyhow::Result<()> {
    let catalog = load_catalog(&config).await?;
    let channel = find_channel(&catalog, id)?.clone();
    let format = OutputFormat::from(format);

    let player = HeadlessPlayer::new(Duration::from_millis(config.player.manifest_timeout_ms))?;
    let mut sequencer = PlaybackSequencer::new(config, player, HeadlessAdPlayer::default())?;
    let mut events = sequencer.subscribe_events();
    let player = sequencer.player();

    let started = Instant::now();
    let run_for = match duration {
        0 => Duration::from_secs(60 * 60 * 24 * 365),
        secs => Duration::from_secs(secs),
    };
    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    info!(channel_id = %channel.id, title = %channel.title, "Playing");
    sequencer.select_channel(channel).await;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                let state = sequencer.state();
                if matches!(state, PlaybackState::MainPlaying { .. }) {
                    let position = player.lock().await.position();
                    sequencer.player_event(PlayerEvent::TimeUpdate { position });
                }
                if skip_ads && state.can_skip() {
                    sequencer.skip();
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event, started.elapsed(), format)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed sequencer events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    sequencer.teardown().await;
    while let Ok(event) = events.try_recv() {
        print_event(&event, started.elapsed(), format)?;
    }

    let tracker = sequencer.tracker();
    let impressions = tracker.count(AdTrackingEvent::Impression).await;
    let skips = tracker.count(AdTrackingEvent::Skip).await;
    let completes = tracker.count(AdTrackingEvent::Complete).await;

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "impressions": impressions,
                "skips": skips,
                "completes": completes,
            });
            println!("{}", serde_json::to_string(&summary)?);
        }
        OutputFormat::Text | OutputFormat::Table => {
            println!("\nAds: {impressions} shown, {skips} skipped, {completes} completed");
        }
    }

    Ok(())
}
