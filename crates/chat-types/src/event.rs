use serde::{Deserialize, Serialize};

/// Change notifications emitted by the session store.
/// The presentation layer drains these and re-reads the state it renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// Session list changed (membership, titles or order)
    SessionsChanged,

    /// A different session (or none) is now active
    ActiveSessionChanged { session_id: Option<String> },

    /// The message list was replaced wholesale (load, truncate, delete, clear)
    MessagesReplaced { session_id: Option<String> },

    /// A message was appended to the active list
    MessageAppended { id: String },

    /// An existing message changed in place (stream delta, reconciliation)
    MessageUpdated { id: String },

    /// In-flight network work started or finished
    LoadingChanged { loading: bool },

    /// Advisory error for the presentation layer
    Error { message: String },
}
