//! Server payload shapes and the lenient field decoders they share.
//!
//! The backend is loose about types: ids arrive as integers or strings,
//! timestamps with or without an offset, attachment lists as arrays or as
//! JSON-encoded strings. Everything is coerced here so the rest of the
//! workspace only sees canonical values.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::attachment::{parse_raw_attachments, RawAttachment};

/// One exchange as returned by `GET /chat-sessions/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Structured list or serialized JSON string; normalized later.
    #[serde(default)]
    pub attachments: Value,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub assistant_attachments: Value,
}

/// Body of a completed `/chat` or `/chat/with-files` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default, deserialize_with = "de_raw_attachments")]
    pub attachments: Vec<RawAttachment>,
    /// Server echo of the files the user uploaded.
    #[serde(
        default,
        rename = "originalAttachments",
        alias = "original_attachments",
        deserialize_with = "de_opt_raw_attachments"
    )]
    pub original_attachments: Option<Vec<RawAttachment>>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub chat_id: Option<String>,
}

/// First line of a streamed multipart reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamPreamble {
    #[serde(default, deserialize_with = "de_raw_attachments")]
    pub attachments: Vec<RawAttachment>,
}

/// Body of `GET /file-context/recent/{session_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentFiles {
    #[serde(default)]
    pub files: Vec<RecentFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentFile {
    #[serde(default)]
    pub file: RawAttachment,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub chat_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Parse RFC 3339, or a naive ISO timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {}", other))),
    }
}

pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected string or number id, got {}", other))),
    }
}

pub(crate) fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_timestamp(deserializer)?.unwrap_or_else(Utc::now))
}

pub(crate) fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let parsed = parse_timestamp(&s);
        if parsed.is_none() {
            log::warn!("Unparseable timestamp {:?}", s);
        }
        parsed
    }))
}

fn de_raw_attachments<'de, D>(deserializer: D) -> Result<Vec<RawAttachment>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_raw_attachments(&value))
}

fn de_opt_raw_attachments<'de, D>(deserializer: D) -> Result<Option<Vec<RawAttachment>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => Ok(Some(parse_raw_attachments(&value))),
    }
}
