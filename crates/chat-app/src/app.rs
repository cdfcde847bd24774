//! `ChatClient`: the JS-facing handle over the session store.
//!
//! Async operations return Promises; state is read back through
//! `snapshot()` after draining `drainEvents()`.

use std::rc::Rc;

use gloo_utils::format::JsValueSerdeExt;
use js_sys::{Array, Promise, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use chat_core::{Draft, EventBus, Identity, SendOutcome, SessionStore};
use chat_platform::{HttpTransport, ObjectUrlPreviews};
use chat_types::{ChatError, attachment::PendingFile, config::ClientConfig};

#[wasm_bindgen]
pub struct ChatClient {
    store: SessionStore,
    transport: Rc<HttpTransport>,
}

#[wasm_bindgen]
impl ChatClient {
    /// `config` is an optional JSON object; missing fields take defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<ChatClient, JsValue> {
        let config = match config {
            Some(raw) => ClientConfig::from_json(&raw).map_err(to_js)?,
            None => ClientConfig::default(),
        };
        let transport = Rc::new(HttpTransport::new(&config));
        let store = SessionStore::new(
            config,
            transport.clone(),
            Rc::new(ObjectUrlPreviews::new()),
            EventBus::new(),
        );
        Ok(Self { store, transport })
    }

    /// Sign in (`userId` and `token`) or out (both absent).
    #[wasm_bindgen(js_name = setIdentity)]
    pub fn set_identity(&self, user_id: Option<String>, token: Option<String>) -> Promise {
        self.transport.set_credential(token);
        self.transport.set_user_id(user_id.clone());
        let store = self.store.clone();
        future_to_promise(async move {
            store
                .on_identity_changed(user_id.map(Identity::new))
                .await
                .map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = loadSessions)]
    pub fn load_sessions(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.load_sessions().await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = createSession)]
    pub fn create_session(&self, title: Option<String>) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let session = store.create_session(title.as_deref()).await.map_err(to_js)?;
            to_js_value(&session)
        })
    }

    #[wasm_bindgen(js_name = selectSession)]
    pub fn select_session(&self, id: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.select_session(&id).await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolves to `"completed"`, `"failed"` or `"aborted"`.
    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, text: String, files: Option<Array>) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let files = match files {
                Some(files) => read_files(&files).await?,
                None => Vec::new(),
            };
            let outcome = store.send_message(Draft::text(text).with_files(files)).await;
            Ok(JsValue::from_str(outcome_label(&outcome)))
        })
    }

    #[wasm_bindgen(js_name = resendMessage)]
    pub fn resend_message(&self, text: String, message_id: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let outcome = store.resend_message(&text, &message_id).await;
            Ok(JsValue::from_str(outcome_label(&outcome)))
        })
    }

    /// Returns how many messages were removed.
    #[wasm_bindgen(js_name = deleteMessage)]
    pub fn delete_message(&self, message_id: &str) -> usize {
        self.store.delete_message(message_id)
    }

    #[wasm_bindgen(js_name = updateSessionTitle)]
    pub fn update_session_title(&self, id: String, title: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.update_session_title(&id, &title).await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = deleteSession)]
    pub fn delete_session(&self, id: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            store.delete_session(&id).await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = clearMessages)]
    pub fn clear_messages(&self) {
        self.store.clear_messages();
    }

    /// Stop one streamed reply by correlation id, or all of them.
    #[wasm_bindgen(js_name = stopGeneration)]
    pub fn stop_generation(&self, correlation_id: Option<String>) -> usize {
        self.store.stop_generation(correlation_id.as_deref())
    }

    #[wasm_bindgen(js_name = recentFiles)]
    pub fn recent_files(&self, limit: Option<u32>) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let files = store.recent_files(limit).await.map_err(to_js)?;
            to_js_value(&files)
        })
    }

    #[wasm_bindgen(js_name = fileContext)]
    pub fn file_context(&self, chat_id: String, file_index: Option<u32>) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let context = store.file_context(&chat_id, file_index).await.map_err(to_js)?;
            to_js_value(&context)
        })
    }

    // ─── State ───────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.store.snapshot())
    }

    /// Pending change notifications, oldest first.
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.store.events().drain_coalesced())
    }

    #[wasm_bindgen(js_name = hasPendingEvents)]
    pub fn has_pending_events(&self) -> bool {
        self.store.events().has_pending()
    }

    #[wasm_bindgen(js_name = isLoading)]
    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.store.error()
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&self) {
        self.store.clear_error();
    }
}

fn outcome_label(outcome: &SendOutcome) -> &'static str {
    match outcome {
        SendOutcome::Completed => "completed",
        SendOutcome::Failed(_) => "failed",
        SendOutcome::Aborted => "aborted",
    }
}

fn to_js(err: ChatError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_js_value<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| to_js(e.into()))
}

/// Copy picked `File`s into memory.
async fn read_files(files: &Array) -> Result<Vec<PendingFile>, JsValue> {
    let mut pending = Vec::with_capacity(files.length() as usize);
    for value in files.iter() {
        let file: web_sys::File = value
            .dyn_into()
            .map_err(|_| to_js(ChatError::Validation("expected a File".to_string())))?;
        let buffer = JsFuture::from(file.array_buffer()).await?;
        let bytes = Uint8Array::new(&buffer).to_vec();
        pending.push(PendingFile::new(file.name(), file.type_(), bytes));
    }
    Ok(pending)
}
