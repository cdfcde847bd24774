//! Browser adapters for the chat-core ports.

pub mod http;
pub mod previews;

pub use http::HttpTransport;
pub use previews::ObjectUrlPreviews;
