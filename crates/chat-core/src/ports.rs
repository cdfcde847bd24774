//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use chat_types::{Result, attachment::PendingFile};

// ─── Endpoints ───────────────────────────────────────────────

pub mod paths {
    pub const SESSIONS: &str = "/chat-sessions";
    pub const CHAT: &str = "/chat";
    pub const CHAT_WITH_FILES: &str = "/chat/with-files";
    pub const STREAM: &str = "/streaming";
    pub const STREAM_WITH_FILES: &str = "/streaming/with-files";
    pub const FILE_CONTEXT: &str = "/file-context";

    pub fn session(id: &str) -> String {
        format!("{}/{}", SESSIONS, id)
    }

    pub fn recent_files(session_id: &str, limit: u32) -> String {
        format!("{}/recent/{}?limit={}", FILE_CONTEXT, session_id, limit)
    }

    pub fn file_context(chat_id: &str, file_index: Option<u32>) -> String {
        match file_index {
            Some(i) => format!("{}/{}?file_index={}", FILE_CONTEXT, chat_id, i),
            None => format!("{}/{}", FILE_CONTEXT, chat_id),
        }
    }
}

// ─── Transport Port ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Form field carrying uploaded files
pub const FILES_FIELD: &str = "files";

/// A multipart body: text fields plus files, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<PendingFile>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn files(mut self, files: impl IntoIterator<Item = PendingFile>) -> Self {
        self.files.extend(files);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response body, chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>>>>;

/// HTTP plumbing. Implementations attach the bearer credential, resolve
/// paths against the API base and map non-2xx statuses to errors.
#[async_trait(?Send)]
pub trait TransportPort {
    /// JSON request/response. An empty body resolves to `Value::Null`.
    async fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> Result<Value>;

    /// Multipart POST with a JSON response
    async fn request_multipart(&self, path: &str, form: MultipartForm) -> Result<Value>;

    /// JSON POST whose response body is read incrementally
    async fn stream_request(
        &self,
        path: &str,
        body: Value,
        cancel: CancellationToken,
    ) -> Result<ByteStream>;

    /// Multipart POST whose response body is read incrementally
    async fn stream_multipart_request(
        &self,
        path: &str,
        form: MultipartForm,
        cancel: CancellationToken,
    ) -> Result<ByteStream>;

    /// Whether a bearer credential is available
    fn has_credential(&self) -> bool;

    /// Name of this transport (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Preview Port ────────────────────────────────────────────

/// Allocator for local preview handles (object URLs in the browser).
pub trait PreviewPort {
    fn create_handle(&self, file: &PendingFile) -> Result<String>;

    /// Must tolerate unknown handles.
    fn revoke_handle(&self, handle: &str);
}
