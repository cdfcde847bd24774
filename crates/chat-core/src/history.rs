//! Stored exchanges → display messages.

use std::collections::HashMap;

use chrono::Utc;
use chat_types::{
    attachment::normalize_attachments,
    message::{response_id_for, DeliveryState, Message, NO_RESPONSE},
    wire::HistoryRow,
};

/// Flatten stored rows into `[user, assistant, user, assistant, …]`.
///
/// Each row is one exchange. The reply is looked up by the row id; when
/// several rows share an id the first one answers for all of them.
pub fn history_to_messages(rows: &[HistoryRow]) -> Vec<Message> {
    let mut replies: HashMap<&str, &HistoryRow> = HashMap::with_capacity(rows.len());
    for row in rows {
        replies.entry(row.id.as_str()).or_insert(row);
    }

    let mut messages = Vec::with_capacity(rows.len() * 2);
    for row in rows {
        let timestamp = row.timestamp.unwrap_or_else(Utc::now);

        let mut user = Message::user(&row.id, row.message.clone().unwrap_or_default())
            .with_attachments(normalize_attachments(&row.attachments))
            .with_timestamp(timestamp)
            .with_server_id(Some(row.id.clone()));
        user.settle(DeliveryState::Delivered);
        messages.push(user);

        let reply = replies.get(row.id.as_str()).copied().unwrap_or(row);
        let text = reply
            .response
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(NO_RESPONSE);
        messages.push(
            Message::assistant(response_id_for(&row.id), text)
                .with_attachments(normalize_attachments(&reply.assistant_attachments))
                .with_timestamp(reply.timestamp.unwrap_or(timestamp))
                .with_server_id(Some(row.id.clone())),
        );
    }
    messages
}
