use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name used when neither the client nor the server knows one.
pub const FALLBACK_NAME: &str = "Attachment";

/// Where an attachment's bytes can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "href", rename_all = "lowercase")]
pub enum Locator {
    /// Revocable local handle (a browser object URL) owned by the client.
    Preview(String),
    /// Server-side URL, stable once confirmed.
    Remote(String),
}

impl Locator {
    pub fn is_preview(&self) -> bool {
        matches!(self, Locator::Preview(_))
    }
}

/// Canonical attachment shape used everywhere past the wire boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

impl Attachment {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() { FALLBACK_NAME.to_string() } else { name },
            mime: String::new(),
            locator: None,
            size: None,
            extracted_text: None,
        }
    }

    /// Optimistic entry for a file that has not been uploaded yet.
    pub fn from_pending(file: &PendingFile, preview: Option<String>) -> Self {
        Self {
            mime: file.mime.clone(),
            locator: preview.map(Locator::Preview),
            size: Some(file.size()),
            ..Self::named(file.name.clone())
        }
    }

    pub fn preview_handle(&self) -> Option<&str> {
        match &self.locator {
            Some(Locator::Preview(h)) => Some(h),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.locator {
            Some(Locator::Remote(u)) => Some(u),
            _ => None,
        }
    }

    /// Drop a local preview locator. Returns whether one was present.
    pub fn clear_preview(&mut self) -> bool {
        if self.locator.as_ref().is_some_and(Locator::is_preview) {
            self.locator = None;
            true
        } else {
            false
        }
    }
}

/// Attachment exactly as the server sends it, field names and all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAttachment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "type", alias = "content_type")]
    pub mime: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

impl RawAttachment {
    /// First non-empty of `name`, `original_name`, `filename`.
    pub fn explicit_name(&self) -> Option<&str> {
        [&self.name, &self.original_name, &self.filename]
            .into_iter()
            .filter_map(|n| n.as_deref())
            .find(|n| !n.is_empty())
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref().filter(|m| !m.is_empty())
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn into_attachment(self) -> Attachment {
        Attachment {
            name: self.explicit_name().unwrap_or(FALLBACK_NAME).to_string(),
            mime: self.mime().unwrap_or_default().to_string(),
            locator: self.remote_url().map(|u| Locator::Remote(u.to_string())),
            size: self.size,
            extracted_text: self.extracted_text,
        }
    }
}

/// Decode an attachment field that may be an array, a JSON-encoded string
/// of an array, or absent. Anything unreadable becomes an empty list.
pub fn parse_raw_attachments(value: &Value) -> Vec<RawAttachment> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(_) => Vec::<RawAttachment>::deserialize(value).unwrap_or_else(|e| {
            log::warn!("Discarding malformed attachment list: {}", e);
            Vec::new()
        }),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Array(_)) => parse_raw_attachments(&inner),
            Ok(Value::Null) => Vec::new(),
            Ok(other) => {
                log::warn!("Serialized attachments are not a list: {}", other);
                Vec::new()
            }
            Err(e) => {
                log::warn!("Error parsing serialized attachments: {}", e);
                Vec::new()
            }
        },
        other => {
            log::warn!("Unexpected attachments value: {}", other);
            Vec::new()
        }
    }
}

pub fn normalize_attachments(value: &Value) -> Vec<Attachment> {
    parse_raw_attachments(value)
        .into_iter()
        .map(RawAttachment::into_attachment)
        .collect()
}

/// A file picked by the user, already validated, waiting to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFile {
    pub name: String,
    pub mime: String,
    pub data: Rc<[u8]>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Rc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}
