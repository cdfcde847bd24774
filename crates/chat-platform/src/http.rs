//! Backend transport over browser `fetch()`.
//!
//! Uses gloo-net for WASM compatibility. Streamed responses are read chunk
//! by chunk from the body's `ReadableStream`; cancelling the token aborts
//! the fetch through an `AbortController`. Dropping the body stream does too.

use std::cell::RefCell;

use async_trait::async_trait;
use futures::stream;
use gloo_net::http::{Request, RequestBuilder, Response};
use js_sys::{Reflect, Uint8Array};
use serde::Deserialize;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use tokio_util::sync::{CancellationToken, DropGuard};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{AbortController, FormData, ReadableStream, ReadableStreamDefaultReader};

use chat_core::ports::*;
use chat_types::{ChatError, Result, config::ClientConfig};

use crate::previews::file_blob;

/// Talks to the chat backend with a bearer token.
pub struct HttpTransport {
    base_url: String,
    token: RefCell<Option<String>>,
    user_id: RefCell<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.api_base().to_string(),
            token: RefCell::new(None),
            user_id: RefCell::new(None),
        }
    }

    /// Replace the bearer token (`None` on sign-out).
    pub fn set_credential(&self, token: Option<String>) {
        *self.token.borrow_mut() = token.filter(|t| !t.is_empty());
    }

    /// User id appended to GET requests as `user_id=`.
    pub fn set_user_id(&self, user_id: Option<String>) {
        *self.user_id.borrow_mut() = user_id;
    }

    /// Absolute URL for `path`; GETs carry the user id when one is known.
    pub fn endpoint(&self, method: HttpMethod, path: &str) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if method == HttpMethod::Get {
            if let Some(user_id) = self.user_id.borrow().as_deref() {
                let sep = if url.contains('?') { '&' } else { '?' };
                let encoded: String = js_sys::encode_uri_component(user_id).into();
                url = format!("{}{}user_id={}", url, sep, encoded);
            }
        }
        url
    }

    fn builder(&self, method: HttpMethod, path: &str) -> RequestBuilder {
        let url = self.endpoint(method, path);
        let builder = match method {
            HttpMethod::Get => Request::get(&url),
            HttpMethod::Post => Request::post(&url),
            HttpMethod::Put => Request::put(&url),
            HttpMethod::Delete => Request::delete(&url),
        };
        match self.token.borrow().as_deref() {
            Some(token) => builder.header("Authorization", &format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        if response.ok() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        log::warn!("{} {} -> HTTP {}", self.backend_name(), response.url(), status);
        if status == 401 {
            return Err(ChatError::Unauthenticated);
        }
        Err(ChatError::Http {
            status,
            message: error_detail(&body),
        })
    }

    async fn open_stream(&self, request: Request, guard: DropGuard) -> Result<ByteStream> {
        let response = self.send(request).await?;
        match response.body() {
            Some(body) => Ok(read_body(body, guard)),
            None => Ok(Box::pin(stream::empty())),
        }
    }
}

#[async_trait(?Send)]
impl TransportPort for HttpTransport {
    async fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> Result<Value> {
        let builder = self.builder(method, path);
        let request = match body {
            Some(body) => builder.json(&body),
            None => builder.build(),
        }
        .map_err(|e| ChatError::Network(e.to_string()))?;

        let response = self.send(request).await?;
        json_body(response).await
    }

    async fn request_multipart(&self, path: &str, form: MultipartForm) -> Result<Value> {
        let data = form_data(&form)?;
        let request = self
            .builder(HttpMethod::Post, path)
            .body(data)
            .map_err(|e| ChatError::Network(e.to_string()))?;
        let response = self.send(request).await?;
        json_body(response).await
    }

    async fn stream_request(
        &self,
        path: &str,
        body: Value,
        cancel: CancellationToken,
    ) -> Result<ByteStream> {
        let (controller, guard) = abort_on(&cancel)?;
        let request = self
            .builder(HttpMethod::Post, path)
            .abort_signal(Some(&controller.signal()))
            .json(&body)
            .map_err(|e| ChatError::Network(e.to_string()))?;
        self.open_stream(request, guard).await
    }

    async fn stream_multipart_request(
        &self,
        path: &str,
        form: MultipartForm,
        cancel: CancellationToken,
    ) -> Result<ByteStream> {
        let (controller, guard) = abort_on(&cancel)?;
        let data = form_data(&form)?;
        let request = self
            .builder(HttpMethod::Post, path)
            .abort_signal(Some(&controller.signal()))
            .body(data)
            .map_err(|e| ChatError::Network(e.to_string()))?;
        self.open_stream(request, guard).await
    }

    fn has_credential(&self) -> bool {
        self.token.borrow().is_some()
    }

    fn backend_name(&self) -> &str {
        "fetch"
    }
}

// ─── Helpers ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
    detail: Value,
}

/// FastAPI-style `{"detail": ...}` bodies, or the raw text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: Value::String(s) }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// JSON body, or `Value::Null` when there is none (204 and friends).
async fn json_body(response: Response) -> Result<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn form_data(form: &MultipartForm) -> Result<FormData> {
    let js_err = |e: JsValue| ChatError::JsInterop(format!("{:?}", e));
    let data = FormData::new().map_err(js_err)?;
    for (name, value) in &form.fields {
        data.append_with_str(name, value).map_err(js_err)?;
    }
    for file in &form.files {
        let blob = file_blob(file)?;
        data.append_with_blob_and_filename(FILES_FIELD, &blob, &file.name)
            .map_err(js_err)?;
    }
    Ok(data)
}

/// Abort the fetch once `cancel` fires or the returned guard is dropped.
fn abort_on(cancel: &CancellationToken) -> Result<(AbortController, DropGuard)> {
    let controller = AbortController::new().map_err(|e| ChatError::JsInterop(format!("{:?}", e)))?;
    let done = cancel.child_token();
    let watch = done.clone();
    let handle = controller.clone();
    spawn_local(async move {
        watch.cancelled().await;
        handle.abort();
    });
    Ok((controller, done.drop_guard()))
}

fn read_body(body: ReadableStream, guard: DropGuard) -> ByteStream {
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    Box::pin(stream::unfold(Some((reader, guard)), |state| async move {
        let (reader, guard) = state?;
        match read_chunk(&reader).await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some((reader, guard)))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    }))
}

async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| ChatError::Network(format!("{:?}", e)))?;
    let field = |name: &str| {
        Reflect::get(&result, &JsValue::from_str(name))
            .map_err(|e| ChatError::JsInterop(format!("{:?}", e)))
    };
    if field("done")?.as_bool().unwrap_or(true) {
        return Ok(None);
    }
    let value: Uint8Array = field("value")?.unchecked_into();
    Ok(Some(value.to_vec()))
}
