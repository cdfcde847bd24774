use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;

/// Suffix linking an assistant reply to the user message it answers.
pub const RESPONSE_SUFFIX: &str = "-response";

/// Fixed copy shown when a send fails. Raw errors never reach the user.
pub const ERROR_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Assistant text for a stored exchange that has no reply.
pub const NO_RESPONSE: &str = "No response";

pub const STOPPED_NOTE: &str = "Generation stopped by user.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// Lifecycle of a message.
///
/// `Pending → Streaming? → Delivered | Failed | Stopped`. The last three are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Streaming,
    Delivered,
    Failed,
    Stopped,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryState::Delivered | DeliveryState::Failed | DeliveryState::Stopped
        )
    }
}

/// Client-generated id tying an optimistic message to its server result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of the assistant slot answering this message.
    pub fn response_id(&self) -> String {
        response_id_for(&self.0)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

pub fn response_id_for(id: &str) -> String {
    format!("{}{}", id, RESPONSE_SUFFIX)
}

/// A single entry in a session's message list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub state: DeliveryState,
    /// Server row id once the exchange is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

impl Message {
    fn new(id: impl Into<String>, sender: Sender, text: impl Into<String>, state: DeliveryState) -> Self {
        Self {
            id: id.into(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            state,
            server_id: None,
        }
    }

    /// Optimistic user message, not yet confirmed.
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Sender::User, text, DeliveryState::Pending)
    }

    /// Settled assistant reply.
    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Sender::Assistant, text, DeliveryState::Delivered)
    }

    /// Empty assistant slot reserved at send time.
    pub fn placeholder(id: impl Into<String>, streaming: bool) -> Self {
        let state = if streaming {
            DeliveryState::Streaming
        } else {
            DeliveryState::Pending
        };
        Self::new(id, Sender::Assistant, String::new(), state)
    }

    pub fn error_reply(id: impl Into<String>) -> Self {
        Self::new(id, Sender::Assistant, ERROR_REPLY, DeliveryState::Failed)
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_server_id(mut self, server_id: Option<String>) -> Self {
        self.server_id = server_id;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.state == DeliveryState::Streaming
    }

    /// True for assistant error replies only.
    pub fn is_error(&self) -> bool {
        self.sender == Sender::Assistant && self.state == DeliveryState::Failed
    }

    pub fn is_stopped(&self) -> bool {
        self.state == DeliveryState::Stopped
    }

    pub fn is_settled(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `state` unless already terminal. Returns whether it moved.
    pub fn settle(&mut self, state: DeliveryState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }

    /// Annotation the UI renders under the text, if any.
    pub fn note(&self) -> Option<&'static str> {
        self.is_stopped().then_some(STOPPED_NOTE)
    }
}

/// A message as the presentation layer renders it, with the derived flags
/// spelled out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub is_streaming: bool,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            is_streaming: message.is_streaming(),
            is_error: message.is_error(),
            note: message.note(),
            message,
        }
    }
}
