//! Folding a send's outcome back into the optimistic messages.
//!
//! A send reserves two slots: the user message (id = correlation id) and
//! the assistant reply (`<id>-response`). Whatever happens on the wire, the
//! reconciler produces final versions of both, and releases the local
//! previews the optimistic user message was holding.

use futures::StreamExt;
use chat_types::{
    ChatError,
    attachment::{Attachment, Locator, RawAttachment},
    message::{CorrelationId, DeliveryState, Message},
    wire::ChatReply,
};

use crate::attachments::AttachmentLifecycle;
use crate::ingest::{IngestEvent, StreamingIngester};

/// How a send ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Completed,
    Failed(ChatError),
    /// Stopped by the user; partial text is kept.
    Aborted,
}

impl SendOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SendOutcome::Failed(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SendOutcome::Aborted)
    }
}

/// A send in flight: where it belongs and what the user saw.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub session_id: String,
    pub correlation_id: CorrelationId,
    pub user: Message,
    pub streaming: bool,
}

impl PendingSend {
    pub fn new(session_id: impl Into<String>, user: Message, streaming: bool) -> Self {
        Self {
            session_id: session_id.into(),
            correlation_id: CorrelationId::from(user.id.as_str()),
            user,
            streaming,
        }
    }

    pub fn response_id(&self) -> String {
        self.correlation_id.response_id()
    }

    /// Empty assistant slot reserved next to the user message.
    pub fn placeholder(&self) -> Message {
        Message::placeholder(self.response_id(), self.streaming)
    }
}

/// Final user and assistant messages of one send.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub user: Message,
    pub assistant: Message,
    pub outcome: SendOutcome,
}

/// Intermediate state observed while a streamed reply arrives.
#[derive(Debug, Clone, Copy)]
pub enum ReconcileUpdate<'a> {
    /// The server echoed the uploaded files.
    UserEcho(&'a Message),
    /// More reply text arrived.
    Assistant(&'a Message),
}

impl<'a> ReconcileUpdate<'a> {
    pub fn message(&self) -> &'a Message {
        match self {
            ReconcileUpdate::UserEcho(m) | ReconcileUpdate::Assistant(m) => m,
        }
    }
}

/// Positional merge of the server's attachment metadata over the local list.
///
/// Locator and type come from the server; the local name stays unless the
/// server sends a non-empty one. Unmatched local entries are kept as they
/// are, unmatched server entries are appended.
pub fn merge_attachments(local: &[Attachment], server: &[RawAttachment]) -> Vec<Attachment> {
    let len = local.len().max(server.len());
    let mut merged = Vec::with_capacity(len);
    for i in 0..len {
        match (local.get(i), server.get(i)) {
            (Some(l), Some(s)) => merged.push(merge_one(l, s)),
            (Some(l), None) => merged.push(l.clone()),
            (None, Some(s)) => merged.push(s.clone().into_attachment()),
            (None, None) => {}
        }
    }
    merged
}

fn merge_one(local: &Attachment, server: &RawAttachment) -> Attachment {
    Attachment {
        name: server
            .explicit_name()
            .map_or_else(|| local.name.clone(), str::to_string),
        mime: server
            .mime()
            .map_or_else(|| local.mime.clone(), str::to_string),
        locator: server
            .remote_url()
            .map(|u| Locator::Remote(u.to_string()))
            .or_else(|| local.locator.clone()),
        size: server.size.or(local.size),
        extracted_text: server
            .extracted_text
            .clone()
            .or_else(|| local.extracted_text.clone()),
    }
}

#[derive(Clone)]
pub struct MessageReconciler {
    previews: AttachmentLifecycle,
}

impl MessageReconciler {
    pub fn new(previews: AttachmentLifecycle) -> Self {
        Self { previews }
    }

    /// A complete `/chat` or `/chat/with-files` reply.
    pub fn reconcile_reply(&self, pending: &PendingSend, reply: ChatReply) -> Reconciled {
        let mut user = pending.user.clone();
        let had_local = !user.attachments.is_empty();

        let (echo, own) = match reply.original_attachments {
            Some(echo) => (Some(echo), reply.attachments),
            None if had_local => (Some(reply.attachments), Vec::new()),
            None => (None, reply.attachments),
        };
        if let Some(echo) = echo {
            user.attachments = merge_attachments(&user.attachments, &echo);
        }
        user.server_id = reply.chat_id.clone();

        let assistant = Message::assistant(pending.response_id(), reply.reply.unwrap_or_default())
            .with_attachments(own.into_iter().map(RawAttachment::into_attachment).collect())
            .with_server_id(reply.chat_id);

        self.finish(pending, user, assistant, SendOutcome::Completed)
    }

    pub fn reconcile_failure(&self, pending: &PendingSend, error: ChatError) -> Reconciled {
        log::warn!("Send {} failed: {}", pending.correlation_id, error);
        self.finish(
            pending,
            pending.user.clone(),
            pending.placeholder(),
            SendOutcome::Failed(error),
        )
    }

    /// Stopped before any of the reply arrived.
    pub fn reconcile_aborted(&self, pending: &PendingSend) -> Reconciled {
        log::info!("Send {} stopped before the reply started", pending.correlation_id);
        self.finish(pending, pending.user.clone(), pending.placeholder(), SendOutcome::Aborted)
    }

    /// Drive `ingester` to the end, reporting each intermediate state.
    pub async fn reconcile_stream<F>(
        &self,
        pending: &PendingSend,
        mut ingester: StreamingIngester,
        mut on_update: F,
    ) -> Reconciled
    where
        F: FnMut(ReconcileUpdate<'_>),
    {
        let mut user = pending.user.clone();
        let mut assistant = pending.placeholder();
        let mut echoed = false;

        let outcome = loop {
            match ingester.next().await {
                Some(Ok(IngestEvent::AttachmentPreamble(server))) => {
                    if echoed {
                        continue;
                    }
                    echoed = true;
                    user.attachments = merge_attachments(&user.attachments, &server);
                    self.release_local(pending, &mut user);
                    on_update(ReconcileUpdate::UserEcho(&user));
                }
                Some(Ok(IngestEvent::TextChunk(text))) => {
                    assistant.text.push_str(&text);
                    on_update(ReconcileUpdate::Assistant(&assistant));
                }
                Some(Err(ChatError::Cancelled)) => break SendOutcome::Aborted,
                Some(Err(e)) => {
                    log::warn!("Stream for {} broke off: {}", pending.correlation_id, e);
                    break SendOutcome::Failed(e);
                }
                None => break SendOutcome::Completed,
            }
        };

        if outcome.is_aborted() {
            log::info!(
                "Send {} stopped after {} chars",
                pending.correlation_id,
                assistant.text.chars().count()
            );
        }
        self.finish(pending, user, assistant, outcome)
    }

    fn finish(
        &self,
        pending: &PendingSend,
        mut user: Message,
        mut assistant: Message,
        outcome: SendOutcome,
    ) -> Reconciled {
        self.release_local(pending, &mut user);
        match &outcome {
            SendOutcome::Completed => {
                user.settle(DeliveryState::Delivered);
                assistant.settle(DeliveryState::Delivered);
            }
            SendOutcome::Aborted => {
                user.settle(DeliveryState::Delivered);
                assistant.settle(DeliveryState::Stopped);
            }
            SendOutcome::Failed(_) => {
                user.settle(DeliveryState::Failed);
                assistant = Message::error_reply(pending.response_id());
            }
        }
        Reconciled {
            user,
            assistant,
            outcome,
        }
    }

    /// Revoke the optimistic previews and strip any that survived the merge.
    fn release_local(&self, pending: &PendingSend, user: &mut Message) {
        self.previews.release_all(&pending.user.attachments);
        self.previews.release_all(&user.attachments);
        for attachment in &mut user.attachments {
            attachment.clear_preview();
        }
    }
}
