//! Session store, the single owner of sessions and the active conversation.
//!
//! Every mutation goes through here. The presentation layer reads snapshots
//! and drains [`StoreEvent`]s from the bus; it never edits state directly.
//!
//! Sends are optimistic: the user message and an empty assistant slot are
//! appended before the first `.await`, and the result replaces those slots
//! by id when it lands. Concurrent sends may complete in any order without
//! disturbing the list order.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use chat_types::{
    ChatError, Result,
    attachment::{Attachment, PendingFile, RawAttachment},
    config::ClientConfig,
    event::StoreEvent,
    message::{CorrelationId, Message, MessageView, RESPONSE_SUFFIX},
    session::{clamp_title, sort_by_recency, Session},
    wire::{ChatReply, HistoryRow, RecentFiles},
};

use crate::attachments::AttachmentLifecycle;
use crate::event_bus::EventBus;
use crate::history::history_to_messages;
use crate::ingest::StreamingIngester;
use crate::ports::*;
use crate::reconcile::{MessageReconciler, PendingSend, Reconciled, ReconcileUpdate, SendOutcome};

/// Load state of the active session's messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Unloaded,
    Loading,
    Ready,
}

/// The signed-in user, as far as the store cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// What the user is about to send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub text: String,
    pub files: Vec<PendingFile>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<PendingFile>) -> Self {
        self.files = files;
        self
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Serializable view of the store for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub sessions: Vec<Session>,
    pub active_session: Option<Session>,
    pub messages: Vec<MessageView>,
    pub phase: SessionPhase,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct InFlight {
    session_id: String,
    cancel: CancellationToken,
}

#[derive(Default)]
struct StoreState {
    identity: Option<Identity>,
    sessions: Vec<Session>,
    active: Option<Session>,
    messages: Vec<Message>,
    phase: SessionPhase,
    busy: usize,
    error: Option<String>,
    loading_sessions: bool,
    /// Bumped on every identity change; older session fetches are dropped.
    epoch: u64,
    /// Bumped whenever the visible conversation is swapped out.
    generation: u64,
    /// Streamed sends keyed by correlation id
    in_flight: HashMap<String, InFlight>,
}

impl StoreState {
    fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.id.as_str())
    }

    fn is_active(&self, session_id: &str) -> bool {
        self.active_id() == Some(session_id)
    }

    /// Swap out the visible conversation, returning what was there.
    fn switch_to(&mut self, session: Option<Session>, phase: SessionPhase) -> Vec<Message> {
        self.active = session;
        self.phase = phase;
        self.generation += 1;
        std::mem::take(&mut self.messages)
    }
}

struct StoreInner {
    config: ClientConfig,
    transport: Rc<dyn TransportPort>,
    previews: AttachmentLifecycle,
    reconciler: MessageReconciler,
    events: EventBus,
    state: RefCell<StoreState>,
}

/// Handle to the session store. Clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Rc<StoreInner>,
}

impl SessionStore {
    pub fn new(
        config: ClientConfig,
        transport: Rc<dyn TransportPort>,
        previews: Rc<dyn PreviewPort>,
        events: EventBus,
    ) -> Self {
        let previews = AttachmentLifecycle::new(previews);
        log::info!("Session store over {} ({})", config.api_base(), transport.backend_name());
        Self {
            inner: Rc::new(StoreInner {
                reconciler: MessageReconciler::new(previews.clone()),
                config,
                transport,
                previews,
                events,
                state: RefCell::new(StoreState::default()),
            }),
        }
    }

    // ─── Reads ────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn previews(&self) -> &AttachmentLifecycle {
        &self.inner.previews
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state().identity.clone()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    pub fn active_session(&self) -> Option<Session> {
        self.state().active.clone()
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.state().active_id().map(str::to_string)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.state().messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn is_loading(&self) -> bool {
        self.state().busy > 0
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn clear_error(&self) {
        self.state_mut().error = None;
    }

    /// Streamed sends that can still be stopped.
    pub fn in_flight(&self) -> usize {
        self.state().in_flight.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let s = self.state();
        StoreSnapshot {
            sessions: s.sessions.clone(),
            active_session: s.active.clone(),
            messages: s.messages.iter().cloned().map(MessageView::from).collect(),
            phase: s.phase,
            is_loading: s.busy > 0,
            error: s.error.clone(),
        }
    }

    // ─── Identity ─────────────────────────────────────────────

    /// Feed the current sign-in state. Logging out clears everything; a new
    /// user gets their sessions loaded when the transport holds a credential.
    pub async fn on_identity_changed(&self, identity: Option<Identity>) -> Result<()> {
        {
            let mut s = self.state_mut();
            if s.identity == identity {
                return Ok(());
            }
            s.identity = identity.clone();
        }
        self.reset();

        let Some(identity) = identity else {
            log::info!("Signed out; session state cleared");
            return Ok(());
        };
        log::info!("Signed in as {}", identity.user_id);
        if !self.inner.transport.has_credential() {
            log::info!("No credential yet; not loading sessions");
            return Ok(());
        }
        self.load_sessions().await
    }

    fn reset(&self) {
        let (tokens, discarded) = {
            let mut s = self.state_mut();
            let tokens: Vec<CancellationToken> = s.in_flight.drain().map(|(_, f)| f.cancel).collect();
            s.sessions.clear();
            s.error = None;
            s.epoch += 1;
            s.loading_sessions = false;
            (tokens, s.switch_to(None, SessionPhase::Unloaded))
        };
        for token in tokens {
            token.cancel();
        }
        self.inner.previews.release_all(&attachments_of(&discarded));
        self.emit(StoreEvent::SessionsChanged);
        self.emit_switched(None);
    }

    // ─── Sessions ─────────────────────────────────────────────

    /// Fetch the session list. An empty list gets a fresh session; otherwise
    /// the most recent one is selected unless something already is.
    /// A call made while another is running returns immediately.
    pub async fn load_sessions(&self) -> Result<()> {
        if !self.inner.transport.has_credential() {
            return Err(ChatError::Unauthenticated);
        }
        let epoch = {
            let mut s = self.state_mut();
            if s.loading_sessions {
                log::debug!("Session load already in flight");
                return Ok(());
            }
            s.loading_sessions = true;
            s.epoch
        };

        let fetched = {
            let _busy = BusyGuard::new(self);
            self.fetch_sessions().await
        };
        {
            let mut s = self.state_mut();
            if s.epoch != epoch {
                log::debug!("Discarding sessions fetched before an identity change");
                return Ok(());
            }
            s.loading_sessions = false;
        }

        let sessions = match fetched {
            Ok(sessions) => sessions,
            Err(e) => {
                self.report("Failed to load chat sessions", &e);
                return Err(e);
            }
        };
        log::info!("Loaded {} session(s)", sessions.len());

        let first = sessions.first().map(|s| s.id.clone());
        let has_active = {
            let mut s = self.state_mut();
            s.sessions = sessions;
            s.active.is_some()
        };
        self.emit(StoreEvent::SessionsChanged);

        match first {
            None => self.create_session(None).await.map(|_| ()),
            Some(id) if !has_active => self.select_session(&id).await,
            Some(_) => Ok(()),
        }
    }

    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        let value = self
            .inner
            .transport
            .request(HttpMethod::Get, paths::SESSIONS, None)
            .await?;
        let mut sessions: Vec<Session> = serde_json::from_value(value)?;
        sort_by_recency(&mut sessions);
        Ok(sessions)
    }

    /// Create a session, put it at the top of the list and open it.
    /// A missing or blank title falls back to the configured default.
    pub async fn create_session(&self, title: Option<&str>) -> Result<Session> {
        let title = title
            .and_then(|t| clamp_title(t, self.inner.config.max_title_len))
            .unwrap_or_else(|| self.inner.config.default_session_title.clone());

        let epoch = self.state().epoch;
        let created = {
            let _busy = BusyGuard::new(self);
            self.inner
                .transport
                .request(HttpMethod::Post, paths::SESSIONS, Some(json!({ "title": title })))
                .await
                .and_then(|v| Ok(serde_json::from_value::<Session>(v)?))
        };
        let mut session = match created {
            Ok(session) => session,
            Err(e) => {
                self.report("Failed to create new chat session", &e);
                return Err(e);
            }
        };
        log::info!("Created session {} ({:?})", session.id, session.title);

        let discarded = {
            let mut s = self.state_mut();
            if s.epoch != epoch {
                log::debug!("Not opening session {}: identity changed meanwhile", session.id);
                return Err(ChatError::Cancelled);
            }
            s.sessions.retain(|x| x.id != session.id);
            // Prepending must not break the recency order, whatever the clocks say.
            session.touch(Utc::now());
            if let Some(newest) = s.sessions.first().map(|x| x.updated_at) {
                session.touch(newest);
            }
            s.sessions.insert(0, session.clone());
            s.switch_to(Some(session.clone()), SessionPhase::Ready)
        };
        self.inner.previews.release_all(&attachments_of(&discarded));
        self.emit(StoreEvent::SessionsChanged);
        self.emit_switched(Some(&session.id));
        Ok(session)
    }

    /// Open a session and load its history. Unknown ids and the session
    /// already open are ignored. A failed load leaves the session unloaded
    /// so selecting it again retries.
    pub async fn select_session(&self, id: &str) -> Result<()> {
        let (generation, discarded) = {
            let mut s = self.state_mut();
            let Some(session) = s.sessions.iter().find(|x| x.id == id).cloned() else {
                log::debug!("Ignoring selection of unknown session {}", id);
                return Ok(());
            };
            if s.is_active(id) && s.phase != SessionPhase::Unloaded {
                return Ok(());
            }
            let discarded = s.switch_to(Some(session), SessionPhase::Loading);
            (s.generation, discarded)
        };
        self.inner.previews.release_all(&attachments_of(&discarded));
        self.emit_switched(Some(id));

        let loaded = {
            let _busy = BusyGuard::new(self);
            self.fetch_history(id).await
        };

        let outcome = {
            let mut s = self.state_mut();
            if s.generation != generation {
                log::debug!("Discarding stale history for session {}", id);
                return Ok(());
            }
            match loaded {
                Ok(messages) => {
                    log::debug!("Session {}: {} message(s)", id, messages.len());
                    s.messages = messages;
                    s.phase = SessionPhase::Ready;
                    Ok(())
                }
                Err(e) => {
                    s.phase = SessionPhase::Unloaded;
                    Err(e)
                }
            }
        };
        match &outcome {
            Ok(()) => self.emit(StoreEvent::MessagesReplaced {
                session_id: Some(id.to_string()),
            }),
            Err(e) => self.report("Failed to load chat messages", e),
        }
        outcome
    }

    async fn fetch_history(&self, id: &str) -> Result<Vec<Message>> {
        let value = self
            .inner
            .transport
            .request(HttpMethod::Get, &paths::session(id), None)
            .await?;
        let rows: Vec<HistoryRow> = serde_json::from_value(value)?;
        Ok(history_to_messages(&rows))
    }

    /// Rename after the server confirms. A blank title does nothing.
    pub async fn update_session_title(&self, id: &str, title: &str) -> Result<()> {
        let Some(title) = clamp_title(title, self.inner.config.max_title_len) else {
            log::debug!("Blank title for session {}; ignoring", id);
            return Ok(());
        };

        let result = {
            let _busy = BusyGuard::new(self);
            self.inner
                .transport
                .request(HttpMethod::Put, &paths::session(id), Some(json!({ "title": title })))
                .await
        };
        if let Err(e) = result {
            self.report("Failed to update chat title", &e);
            return Err(e);
        }

        {
            let mut s = self.state_mut();
            if let Some(session) = s.sessions.iter_mut().find(|x| x.id == id) {
                session.title = title.clone();
            }
            if let Some(active) = s.active.as_mut().filter(|a| a.id == id) {
                active.title = title;
            }
        }
        self.emit(StoreEvent::SessionsChanged);
        Ok(())
    }

    /// Delete a session. Deleting the open one moves to the next session,
    /// or to a new one when none are left.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let result = {
            let _busy = BusyGuard::new(self);
            self.inner
                .transport
                .request(HttpMethod::Delete, &paths::session(id), None)
                .await
        };
        if let Err(e) = result {
            self.report("Failed to delete chat", &e);
            return Err(e);
        }
        log::info!("Deleted session {}", id);

        let (was_active, next, tokens, discarded) = {
            let mut s = self.state_mut();
            s.sessions.retain(|x| x.id != id);
            let tokens = take_in_flight(&mut s, |f| f.session_id == id);
            let was_active = s.is_active(id);
            let discarded = if was_active {
                s.switch_to(None, SessionPhase::Unloaded)
            } else {
                Vec::new()
            };
            (was_active, s.sessions.first().map(|x| x.id.clone()), tokens, discarded)
        };
        for token in tokens {
            token.cancel();
        }
        self.inner.previews.release_all(&attachments_of(&discarded));
        self.emit(StoreEvent::SessionsChanged);
        if !was_active {
            return Ok(());
        }
        self.emit_switched(None);

        let followup = match next {
            Some(next) => self.select_session(&next).await,
            None => self.create_session(None).await.map(|_| ()),
        };
        if let Err(e) = followup {
            log::warn!("No session opened after deleting {}: {}", id, e);
        }
        Ok(())
    }

    // ─── Messages ─────────────────────────────────────────────

    /// Send a message in the active session, creating one if needed.
    ///
    /// Both slots are visible before this first yields. Errors never escape:
    /// a failed send shows up as an error reply and `SendOutcome::Failed`.
    pub async fn send_message(&self, draft: Draft) -> SendOutcome {
        let session_id = match self.active_session_id() {
            Some(id) => id,
            None => match self.create_session(None).await {
                Ok(session) => session.id,
                Err(e) => return SendOutcome::Failed(e),
            },
        };

        let cid = CorrelationId::generate();
        let user = Message::user(cid.as_str(), draft.text.clone())
            .with_attachments(self.inner.previews.stage(&draft.files));
        let pending = PendingSend::new(session_id, user, self.inner.config.streaming);
        {
            let mut s = self.state_mut();
            s.messages.push(pending.user.clone());
            s.messages.push(pending.placeholder());
        }
        self.emit(StoreEvent::MessageAppended { id: pending.user.id.clone() });
        self.emit(StoreEvent::MessageAppended { id: pending.response_id() });
        log::debug!(
            "Send {} to session {} ({} file(s), streaming: {})",
            cid,
            pending.session_id,
            draft.files.len(),
            pending.streaming
        );

        let reconciled = if pending.streaming {
            self.send_streamed(&pending, draft).await
        } else {
            self.send_complete(&pending, draft).await
        };

        let Reconciled { user, assistant, outcome } = reconciled;
        self.commit(&pending.session_id, user);
        self.commit(&pending.session_id, assistant);
        if !outcome.is_failed() {
            self.touch_session(&pending.session_id);
        }
        outcome
    }

    async fn send_complete(&self, pending: &PendingSend, draft: Draft) -> Reconciled {
        let transport = &self.inner.transport;
        let result = if draft.has_files() {
            let form = upload_form(&pending.session_id, draft);
            transport.request_multipart(paths::CHAT_WITH_FILES, form).await
        } else {
            let body = text_body(&pending.session_id, &draft.text);
            transport.request(HttpMethod::Post, paths::CHAT, Some(body)).await
        };
        match result.and_then(|v| Ok(serde_json::from_value::<ChatReply>(v)?)) {
            Ok(reply) => self.inner.reconciler.reconcile_reply(pending, reply),
            Err(e) => self.inner.reconciler.reconcile_failure(pending, e),
        }
    }

    async fn send_streamed(&self, pending: &PendingSend, draft: Draft) -> Reconciled {
        let cancel = CancellationToken::new();
        let key = pending.correlation_id.as_str().to_string();
        self.state_mut().in_flight.insert(
            key.clone(),
            InFlight {
                session_id: pending.session_id.clone(),
                cancel: cancel.clone(),
            },
        );

        let transport = &self.inner.transport;
        let opened = if draft.has_files() {
            let form = upload_form(&pending.session_id, draft);
            transport
                .stream_multipart_request(paths::STREAM_WITH_FILES, form, cancel.clone())
                .await
        } else {
            let body = text_body(&pending.session_id, &draft.text);
            transport.stream_request(paths::STREAM, body, cancel.clone()).await
        };

        let reconciler = &self.inner.reconciler;
        let reconciled = match opened {
            Ok(body) => {
                let ingester = StreamingIngester::new(body, cancel.clone());
                reconciler
                    .reconcile_stream(pending, ingester, |update| {
                        self.apply_update(&pending.session_id, update)
                    })
                    .await
            }
            Err(_) if cancel.is_cancelled() => reconciler.reconcile_aborted(pending),
            Err(e) => reconciler.reconcile_failure(pending, e),
        };
        self.state_mut().in_flight.remove(&key);
        reconciled
    }

    fn apply_update(&self, session_id: &str, update: ReconcileUpdate<'_>) {
        self.commit(session_id, update.message().clone());
    }

    /// Replace the slot with `message.id`, if it is still on screen.
    fn commit(&self, session_id: &str, message: Message) -> bool {
        let id = message.id.clone();
        let replaced = {
            let mut s = self.state_mut();
            if !s.is_active(session_id) {
                false
            } else {
                match s.messages.iter_mut().find(|m| m.id == id) {
                    Some(slot) if slot.is_settled() && !message.is_settled() => false,
                    Some(slot) => {
                        *slot = message;
                        true
                    }
                    None => false,
                }
            }
        };
        if replaced {
            self.emit(StoreEvent::MessageUpdated { id });
        } else {
            log::debug!("Dropping update for {}: slot no longer visible", id);
        }
        replaced
    }

    fn touch_session(&self, session_id: &str) {
        let now = Utc::now();
        {
            let mut s = self.state_mut();
            if let Some(session) = s.sessions.iter_mut().find(|x| x.id == session_id) {
                session.touch(now);
            }
            sort_by_recency(&mut s.sessions);
            if let Some(active) = s.active.as_mut().filter(|a| a.id == session_id) {
                active.touch(now);
            }
        }
        self.emit(StoreEvent::SessionsChanged);
    }

    /// Cut the conversation right after `message_id`, then send `text` anew.
    /// Without a match nothing is cut.
    pub async fn resend_message(&self, text: &str, message_id: &str) -> SendOutcome {
        let removed = {
            let mut s = self.state_mut();
            match s.messages.iter().position(|m| m.id == message_id) {
                Some(i) => s.messages.split_off(i + 1),
                None => Vec::new(),
            }
        };
        if !removed.is_empty() {
            log::debug!("Resend truncated {} message(s) after {}", removed.len(), message_id);
            self.discard(removed);
        }
        self.send_message(Draft::text(text)).await
    }

    /// Remove every message whose id contains `message_id`, which takes the
    /// reply (`<id>-response`) along with its user message.
    pub fn delete_message(&self, message_id: &str) -> usize {
        if message_id.is_empty() {
            return 0;
        }
        let removed = {
            let mut s = self.state_mut();
            let (removed, kept): (Vec<Message>, Vec<Message>) = std::mem::take(&mut s.messages)
                .into_iter()
                .partition(|m| m.id.contains(message_id));
            s.messages = kept;
            removed
        };
        let count = removed.len();
        if count > 0 {
            self.discard(removed);
        }
        count
    }

    /// Empty the visible conversation. Nothing is deleted on the server.
    pub fn clear_messages(&self) {
        let removed = std::mem::take(&mut self.state_mut().messages);
        self.discard(removed);
    }

    /// Stop one streamed send, or all of them. Returns how many were stopped.
    pub fn stop_generation(&self, correlation_id: Option<&str>) -> usize {
        let tokens: Vec<CancellationToken> = {
            let s = self.state();
            s.in_flight
                .iter()
                .filter(|(cid, _)| correlation_id.map_or(true, |c| c == cid.as_str()))
                .map(|(_, f)| f.cancel.clone())
                .collect()
        };
        for token in &tokens {
            token.cancel();
        }
        if !tokens.is_empty() {
            log::info!("Stopping {} generation(s)", tokens.len());
        }
        tokens.len()
    }

    /// Drop messages from view: stop their streams and free their previews.
    fn discard(&self, removed: Vec<Message>) {
        let tokens: Vec<CancellationToken> = {
            let mut s = self.state_mut();
            removed
                .iter()
                .filter_map(|m| {
                    let cid = m.id.strip_suffix(RESPONSE_SUFFIX).unwrap_or(m.id.as_str());
                    s.in_flight.remove(cid)
                })
                .map(|f| f.cancel)
                .collect()
        };
        for token in tokens {
            token.cancel();
        }
        self.inner.previews.release_all(&attachments_of(&removed));
        let session_id = self.active_session_id();
        self.emit(StoreEvent::MessagesReplaced { session_id });
    }

    // ─── File context ─────────────────────────────────────────

    /// Files most recently uploaded in the active session.
    pub async fn recent_files(&self, limit: Option<u32>) -> Result<Vec<Attachment>> {
        let Some(session_id) = self.active_session_id() else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(self.inner.config.recent_files_limit);
        let value = self
            .inner
            .transport
            .request(HttpMethod::Get, &paths::recent_files(&session_id, limit), None)
            .await?;
        let recent: RecentFiles = serde_json::from_value(value).unwrap_or_else(|e| {
            log::warn!("Unreadable recent files for {}: {}", session_id, e);
            RecentFiles::default()
        });
        Ok(recent
            .files
            .into_iter()
            .map(|f| f.file)
            .map(RawAttachment::into_attachment)
            .collect())
    }

    /// Stored context of the files attached to a past exchange.
    pub async fn file_context(&self, chat_id: &str, file_index: Option<u32>) -> Result<Value> {
        self.inner
            .transport
            .request(HttpMethod::Get, &paths::file_context(chat_id, file_index), None)
            .await
    }

    // ─── Internals ────────────────────────────────────────────

    fn state(&self) -> Ref<'_, StoreState> {
        self.inner.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, StoreState> {
        self.inner.state.borrow_mut()
    }

    fn emit(&self, event: StoreEvent) {
        self.inner.events.emit(event);
    }

    fn emit_switched(&self, session_id: Option<&str>) {
        let session_id = session_id.map(str::to_string);
        self.emit(StoreEvent::ActiveSessionChanged {
            session_id: session_id.clone(),
        });
        self.emit(StoreEvent::MessagesReplaced { session_id });
    }

    /// Log `err` and raise the advisory flag with `context`.
    fn report(&self, context: &str, err: &ChatError) {
        log::error!("{}: {}", context, err);
        self.state_mut().error = Some(context.to_string());
        self.emit(StoreEvent::Error {
            message: context.to_string(),
        });
    }
}

/// Keeps `is_loading()` true while alive.
struct BusyGuard<'a> {
    store: &'a SessionStore,
}

impl<'a> BusyGuard<'a> {
    fn new(store: &'a SessionStore) -> Self {
        let first = {
            let mut s = store.state_mut();
            s.busy += 1;
            s.busy == 1
        };
        if first {
            store.emit(StoreEvent::LoadingChanged { loading: true });
        }
        Self { store }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let last = {
            let mut s = self.store.state_mut();
            s.busy = s.busy.saturating_sub(1);
            s.busy == 0
        };
        if last {
            self.store.emit(StoreEvent::LoadingChanged { loading: false });
        }
    }
}

fn take_in_flight(state: &mut StoreState, pred: impl Fn(&InFlight) -> bool) -> Vec<CancellationToken> {
    let keys: Vec<String> = state
        .in_flight
        .iter()
        .filter(|(_, f)| pred(f))
        .map(|(k, _)| k.clone())
        .collect();
    keys.iter()
        .filter_map(|k| state.in_flight.remove(k))
        .map(|f| f.cancel)
        .collect()
}

fn attachments_of(messages: &[Message]) -> Vec<Attachment> {
    messages
        .iter()
        .flat_map(|m| m.attachments.iter().cloned())
        .collect()
}

fn text_body(session_id: &str, text: &str) -> Value {
    json!({ "message": text, "session_id": session_id })
}

fn upload_form(session_id: &str, draft: Draft) -> MultipartForm {
    MultipartForm::new()
        .text("message", draft.text)
        .text("session_id", session_id)
        .files(draft.files)
}
