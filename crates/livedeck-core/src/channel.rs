//! Channel records as served by the channel list API

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cookie attribute carrying the CDN authorization token
pub const HDNEA_PARAM: &str = "__hdnea__";

/// A live TV channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier; numeric ids are normalized to strings
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    /// Manifest URL of the live stream
    pub url: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated tag list
    #[serde(default)]
    pub tags: Option<String>,
    /// Clear-key pair as `keyId:keyValue`
    #[serde(default)]
    pub key: Option<String>,
    /// Cookie header value required by the stream's CDN
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// A clear-key DRM key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearKey {
    pub key_id: String,
    pub key: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            logo: None,
            category: None,
            tags: None,
            key: None,
            cookie: None,
            resolution: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Parse the clear-key pair, if the channel has a well-formed one
    pub fn clear_key(&self) -> Option<ClearKey> {
        let (key_id, key) = self.key.as_deref()?.split_once(':')?;
        let (key_id, key) = (key_id.trim(), key.trim());
        if key_id.is_empty() || key.is_empty() {
            return None;
        }
        Some(ClearKey {
            key_id: key_id.to_string(),
            key: key.to_string(),
        })
    }

    /// The `__hdnea__=<token>` pair embedded in the cookie, if any
    pub fn hdnea_token(&self) -> Option<&str> {
        let cookie = self.cookie.as_deref()?;
        let marker = format!("{HDNEA_PARAM}=");
        let start = cookie.find(&marker)?;
        let rest = &cookie[start..];
        let pair = rest.split(';').next().unwrap_or(rest);
        if pair.len() == marker.len() {
            return None;
        }
        Some(pair)
    }

    /// Trimmed, non-empty tags
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Category name used for grouping
    pub fn category_or_default(&self) -> &str {
        match self.category.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => "General",
        }
    }

    /// Logo URL, falling back to a generated avatar
    pub fn logo_url(&self) -> String {
        match self.logo.as_deref() {
            Some(logo) if !logo.is_empty() => logo.to_string(),
            _ => {
                let name: String = url::form_urlencoded::byte_serialize(self.title.as_bytes()).collect();
                format!("https://ui-avatars.com/api/?name={name}&background=6366F1&color=fff&size=128")
            }
        }
    }

    /// Case-insensitive match against title, category and tags.
    /// `query` must already be lowercased and trimmed.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(query))
        };
        self.title.to_lowercase().contains(query) || contains(&self.category) || contains(&self.tags)
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid channel id: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_numeric_id() {
        let json = r#"{"id": 143, "title": "News", "url": "https://x/a.mpd"}"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.id, "143");
        assert_eq!(channel.logo, None);
    }

    #[test]
    fn test_deserialize_rejects_bad_id() {
        let json = r#"{"id": [1], "title": "News", "url": "https://x/a.mpd"}"#;
        assert!(serde_json::from_str::<Channel>(json).is_err());
    }

    #[test]
    fn test_clear_key() {
        let channel = Channel::new("1", "A", "https://x/a.mpd").with_key("abc:def");
        assert_eq!(
            channel.clear_key(),
            Some(ClearKey { key_id: "abc".into(), key: "def".into() })
        );

        assert_eq!(Channel::new("1", "A", "u").with_key("abcdef").clear_key(), None);
        assert_eq!(Channel::new("1", "A", "u").with_key(":def").clear_key(), None);
        assert_eq!(Channel::new("1", "A", "u").clear_key(), None);
    }

    #[test]
    fn test_hdnea_token() {
        let channel = Channel::new("1", "A", "u").with_cookie("__hdnea__=st=1~exp=2~hmac=ff; Path=/");
        assert_eq!(channel.hdnea_token(), Some("__hdnea__=st=1~exp=2~hmac=ff"));

        let trailing = Channel::new("1", "A", "u").with_cookie("other=1; __hdnea__=XYZ");
        assert_eq!(trailing.hdnea_token(), Some("__hdnea__=XYZ"));

        let empty = Channel::new("1", "A", "u").with_cookie("__hdnea__=;x=1");
        assert_eq!(empty.hdnea_token(), None);

        let plain = Channel::new("1", "A", "u").with_cookie("session=abc");
        assert_eq!(plain.hdnea_token(), None);
    }

    #[test]
    fn test_tags_and_matching() {
        let channel = Channel::new("1", "Star Sports", "u")
            .with_category("Sports")
            .with_tags("Cricket, Football ,,");
        assert_eq!(channel.tags().collect::<Vec<_>>(), vec!["Cricket", "Football"]);
        assert!(channel.matches("star"));
        assert!(channel.matches("sports"));
        assert!(channel.matches("football"));
        assert!(!channel.matches("news"));
        assert!(channel.matches(""));
    }

    #[test]
    fn test_logo_fallback() {
        let channel = Channel::new("1", "Star Gold", "u");
        assert_eq!(
            channel.logo_url(),
            "https://ui-avatars.com/api/?name=Star+Gold&background=6366F1&color=fff&size=128"
        );
        assert_eq!(channel.category_or_default(), "General");
    }
}
