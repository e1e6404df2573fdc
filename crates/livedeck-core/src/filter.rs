//! Per-channel request filter for the external player
//!
//! The player calls the filter for every HTTP request it makes. The filter
//! injects the fixed API headers, the channel's cookie, and for manifest and
//! segment requests the CDN token carried inside that cookie.

use crate::channel::{Channel, HDNEA_PARAM};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of request issued by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Manifest,
    Segment,
    License,
    App,
    Timing,
    ServerCertificate,
}

impl RequestType {
    /// Requests that must carry the CDN token in their URL
    pub fn needs_url_token(&self) -> bool {
        matches!(self, RequestType::Manifest | RequestType::Segment)
    }
}

/// An outgoing player request, mutable by the filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Candidate URIs, tried in order
    pub uris: Vec<String>,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            uris: vec![uri.into()],
            headers: BTreeMap::new(),
        }
    }
}

/// Request filter bound to one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    headers: BTreeMap<String, String>,
    cookie: Option<String>,
    token: Option<String>,
}

impl RequestFilter {
    /// Build the filter for a channel on top of the fixed headers
    pub fn for_channel(channel: &Channel, headers: &BTreeMap<String, String>) -> Self {
        let cookie = channel.cookie.clone().filter(|c| !c.is_empty());
        Self {
            headers: headers.clone(),
            token: channel.hdnea_token().map(str::to_string),
            cookie,
        }
    }

    /// CDN token that gets appended to manifest and segment URLs
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn apply(&self, request_type: RequestType, request: &mut HttpRequest) {
        for (name, value) in &self.headers {
            request.headers.insert(name.clone(), value.clone());
        }

        if let Some(cookie) = &self.cookie {
            request.headers.insert("Cookie".to_string(), cookie.clone());
        }

        if let (Some(token), true) = (&self.token, request_type.needs_url_token()) {
            // Only the primary URI carries the token
            if let Some(uri) = request.uris.first_mut() {
                *uri = append_token(uri, token);
            }
        }
    }
}

/// Append `token` to the query of `uri` unless it already carries one.
fn append_token(uri: &str, token: &str) -> String {
    if uri.contains(&format!("{HDNEA_PARAM}=")) {
        return uri.to_string();
    }

    let (base, fragment) = match uri.find('#') {
        Some(i) => uri.split_at(i),
        None => (uri, ""),
    };

    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    format!("{base}{separator}{token}{fragment}")
}
