//! Output formatting for CLI

use livedeck_core::{Channel, SequencerEvent};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

pub fn to_json<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn to_table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// One channel as a table row
#[derive(Tabled)]
pub struct ChannelRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "DRM")]
    pub drm: &'static str,
    #[tabled(rename = "Token")]
    pub token: &'static str,
}

impl From<&Channel> for ChannelRow {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id.clone(),
            title: channel.title.clone(),
            category: channel.category_or_default().to_string(),
            drm: if channel.clear_key().is_some() { "clear-key" } else { "-" },
            token: if channel.hdnea_token().is_some() { "yes" } else { "-" },
        }
    }
}

#[derive(Tabled, Serialize)]
pub struct CategoryRow {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Channels")]
    pub channels: usize,
}

/// Key/value row for single-record tables
#[derive(Tabled)]
pub struct PropertyRow {
    #[tabled(rename = "Property")]
    pub property: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl PropertyRow {
    pub fn new(property: &'static str, value: impl Into<String>) -> Self {
        Self {
            property,
            value: value.into(),
        }
    }
}

/// One line describing a sequencer event
pub fn event_line(event: &SequencerEvent, elapsed_secs: f64) -> String {
    match event {
        SequencerEvent::SessionStarted { channel_id, .. } => {
            format!("[{elapsed_secs:6.1}s] session started for channel {channel_id}")
        }
        SequencerEvent::StateChanged { state, .. } => {
            format!("[{elapsed_secs:6.1}s] {:<28} {}", state.to_string(), state.status_label())
        }
        SequencerEvent::SessionEnded { .. } => format!("[{elapsed_secs:6.1}s] session ended"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedeck_core::{PlaybackState, SessionId};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_channel_row() {
        let channel = Channel::new("1", "A", "https://x/a.mpd")
            .with_key("ab:cd")
            .with_cookie("__hdnea__=t");
        let row = ChannelRow::from(&channel);
        assert_eq!(row.category, "General");
        assert_eq!(row.drm, "clear-key");
        assert_eq!(row.token, "yes");

        let table = to_table(vec![row]);
        assert!(table.contains("clear-key"));
        assert!(table.contains("Category"));
    }

    #[test]
    fn test_event_line() {
        let event = SequencerEvent::StateChanged {
            session: SessionId::new(),
            state: PlaybackState::MainPlaying { channel_id: "1".into() },
        };
        let line = event_line(&event, 3.25);
        assert!(line.starts_with("[   3.2s]") || line.starts_with("[   3.3s]"));
        assert!(line.contains("Live • Watching Now"));
    }
}
