//! Channel catalog: fetching, searching and grouping channels

use crate::channel::Channel;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Raw channel list response
#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Parse a `{success, data: [...]}` channel list body.
///
/// Entries that do not look like channels are skipped rather than failing
/// the whole list.
pub fn parse_channel_list(body: &str) -> Result<Vec<Channel>> {
    let response: ChannelListResponse =
        serde_json::from_str(body).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    if !response.success {
        return Err(Error::InvalidResponse("success flag not set".into()));
    }

    let entries = match response.data {
        Some(serde_json::Value::Array(entries)) => entries,
        _ => return Err(Error::InvalidResponse("data is not an array".into())),
    };

    let channels = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Channel>(entry) {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed channel entry");
                None
            }
        })
        .collect();

    Ok(channels)
}

/// HTTP client for the channel list API
#[derive(Debug, Clone)]
pub struct ChannelClient {
    client: Client,
    url: String,
}

impl ChannelClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidConfig(format!("header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidConfig(format!("header value for {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: config.channels_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the channel list. Failures are returned for the caller to
    /// surface with a retry action; nothing is retried here.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_channels(&self) -> Result<Vec<Channel>> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let channels = parse_channel_list(&body)?;
        info!(count = channels.len(), "Loaded channels");
        Ok(channels)
    }
}

/// One slot of the rendered catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry<'a> {
    Channel(&'a Channel),
    /// Banner ad slot, numbered from zero
    Banner { slot: usize },
}

/// The current channel list; replaced wholesale on every reload
#[derive(Debug, Clone, Default)]
pub struct ChannelCatalog {
    channels: Vec<Channel>,
}

impl ChannelCatalog {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn replace(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Distinct non-empty categories in first-seen order
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for category in self.channels.iter().filter_map(|c| c.category.as_deref()) {
            if !category.trim().is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }

    /// Channels whose title, category or tags contain the query
    pub fn search(&self, query: &str) -> Vec<&Channel> {
        let query = query.trim().to_lowercase();
        self.channels.iter().filter(|c| c.matches(&query)).collect()
    }

    /// Group channels by category in first-seen order
    pub fn grouped<'a>(channels: &[&'a Channel]) -> Vec<(&'a str, Vec<&'a Channel>)> {
        let mut groups: Vec<(&'a str, Vec<&'a Channel>)> = Vec::new();
        for &channel in channels {
            let category = channel.category_or_default();
            match groups.iter_mut().find(|(name, _)| *name == category) {
                Some((_, members)) => members.push(channel),
                None => groups.push((category, vec![channel])),
            }
        }
        groups
    }

    /// Interleave banner slots after every `every` channels (0 disables banners)
    pub fn layout_with_banners<'a>(channels: &[&'a Channel], every: usize) -> Vec<CatalogEntry<'a>> {
        let mut entries = Vec::with_capacity(channels.len() + channels.len() / every.max(1));
        let mut slot = 0;
        for (index, &channel) in channels.iter().enumerate() {
            entries.push(CatalogEntry::Channel(channel));
            if every > 0 && (index + 1) % every == 0 && index + 1 < channels.len() {
                entries.push(CatalogEntry::Banner { slot });
                slot += 1;
            }
        }
        entries
    }
}

/// Forwards only the most recent value once input has been quiet for `delay`
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer and the receiver of settled values
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, mut input) = mpsc::unbounded_channel::<T>();
        let (output, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(mut value) = input.recv().await {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            if output.send(value).is_err() {
                                return;
                            }
                            break;
                        }
                        next = input.recv() => match next {
                            Some(newer) => value = newer,
                            None => {
                                let _ = output.send(value);
                                return;
                            }
                        },
                    }
                }
            }
        });

        (Self { tx, task }, rx)
    }

    /// Submit a value, restarting the quiet period
    pub fn submit(&self, value: T) {
        let _ = self.tx.send(value);
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
