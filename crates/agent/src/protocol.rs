//! Wire types for the agent's event and message protocol.
//!
//! The environment delivers one JSON event per line on stdin; the agent
//! answers on stdout. Message types mirror the page-facing protocol:
//! `{"type":"CACHE_SIZE"}` is answered with `CACHE_SIZE_RESPONSE` carrying
//! raw bytes, entry count, and a formatted size string.

use serde::{Deserialize, Serialize};

/// An environment lifecycle or page event, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Install,
    Activate,
    Fetch {
        #[serde(default = "default_method")]
        method: String,
        url: String,
    },
    Message {
        data: Message,
    },
    Sync {
        tag: String,
    },
    Push {
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    NotificationClick,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A message posted by a controlled page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "CACHE_SIZE")]
    CacheSize,
}

/// Reply sent back over the page's message channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageReply {
    #[serde(rename = "CACHE_SIZE_RESPONSE")]
    CacheSizeResponse { size: CacheSizeInfo },
}

/// The size report for the active generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSizeInfo {
    pub raw: u64,
    pub count: u64,
    pub formatted: String,
}

/// Push payload: title and body for a user-visible notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
}
