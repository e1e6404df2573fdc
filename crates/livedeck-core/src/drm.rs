//! Clear-key DRM configuration
//!
//! Channels carry their content key inline, so no license server is
//! involved: the player receives a `key id -> key` map directly. For players
//! that speak EME, [`DrmConfig::clearkey_license`] renders the equivalent
//! JSON Web Key license.

use crate::channel::Channel;
use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// DRM configuration for a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmConfig {
    /// ClearKey keys (key_id -> key mapping), hex encoded
    pub clearkey_keys: BTreeMap<String, String>,
}

impl DrmConfig {
    /// Create a ClearKey configuration
    pub fn clearkey(keys: BTreeMap<String, String>) -> Self {
        Self { clearkey_keys: keys }
    }

    /// DRM configuration for a channel.
    ///
    /// Channels without a usable key get an empty configuration, which
    /// clears any keys left over from the previous channel.
    pub fn for_channel(channel: &Channel) -> Self {
        let mut keys = BTreeMap::new();
        if let Some(pair) = channel.clear_key() {
            keys.insert(pair.key_id, pair.key);
        }
        Self::clearkey(keys)
    }

    /// Check if any DRM is configured
    pub fn is_configured(&self) -> bool {
        !self.clearkey_keys.is_empty()
    }

    /// Build the clear-key JSON license
    pub fn clearkey_license(&self) -> Result<String> {
        if self.clearkey_keys.is_empty() {
            return Err(Error::InvalidKey("no clear-key keys configured".into()));
        }

        let keys = self
            .clearkey_keys
            .iter()
            .map(|(kid, key)| {
                Ok(serde_json::json!({
                    "kty": "oct",
                    "kid": hex_to_base64url(kid)?,
                    "k": hex_to_base64url(key)?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let license = serde_json::json!({
            "keys": keys,
            "type": "temporary",
        });

        Ok(license.to_string())
    }
}

fn hex_to_base64url(value: &str) -> Result<String> {
    let bytes = hex::decode(value.replace('-', ""))
        .map_err(|e| Error::InvalidKey(format!("{value}: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
