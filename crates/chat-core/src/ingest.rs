//! Streamed reply ingestion.
//!
//! Turns a raw response body into a finite, non-restartable sequence of
//! [`IngestEvent`]s. Streamed uploads put a one-line JSON preamble with the
//! stored attachment metadata in front of the model's text:
//!
//! ```text
//! {"attachments":[{"name":"a.png","url":"/uploads/a.png"}]}\n
//! Here is what I see in the picture...
//! ```
//!
//! Only the first chunk is inspected. If it does not look like a preamble,
//! or the preamble is unreadable, the whole body is plain text.
//!
//! Reads race the token's `cancelled()` future: once it fires, the next item
//! is `Err(ChatError::Cancelled)` and the stream ends.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use chat_types::{ChatError, Result, attachment::RawAttachment, wire::StreamPreamble};

use crate::ports::ByteStream;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    AttachmentPreamble(Vec<RawAttachment>),
    TextChunk(String),
}

pub struct StreamingIngester {
    source: ByteStream,
    cancel: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    decoder: Utf8Decoder,
    saw_first_chunk: bool,
    queued: VecDeque<IngestEvent>,
    source_done: bool,
    finished: bool,
}

impl StreamingIngester {
    pub fn new(source: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            source,
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            cancel,
            decoder: Utf8Decoder::default(),
            saw_first_chunk: false,
            queued: VecDeque::new(),
            source_done: false,
            finished: false,
        }
    }

    fn frame(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if self.saw_first_chunk {
            self.queued.push_back(IngestEvent::TextChunk(text));
            return;
        }
        self.saw_first_chunk = true;
        match split_preamble(&text) {
            Some((attachments, rest)) => {
                self.queued.push_back(IngestEvent::AttachmentPreamble(attachments));
                if !rest.is_empty() {
                    self.queued.push_back(IngestEvent::TextChunk(rest.to_string()));
                }
            }
            None => self.queued.push_back(IngestEvent::TextChunk(text)),
        }
    }
}

impl Stream for StreamingIngester {
    type Item = Result<IngestEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.finished {
                return Poll::Ready(None);
            }
            if this.cancel.is_cancelled() {
                this.finished = true;
                this.queued.clear();
                return Poll::Ready(Some(Err(ChatError::Cancelled)));
            }
            if let Some(event) = this.queued.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.source_done {
                this.finished = true;
                continue;
            }
            match this.source.as_mut().poll_next(cx) {
                Poll::Pending => {
                    if this.cancelled.as_mut().poll(cx).is_ready() {
                        continue;
                    }
                    return Poll::Pending;
                }
                Poll::Ready(Some(Ok(bytes))) => {
                    let text = this.decoder.push(&bytes);
                    this.frame(text);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    // An aborted fetch surfaces as a read error; report the abort.
                    let err = if this.cancel.is_cancelled() { ChatError::Cancelled } else { e };
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.source_done = true;
                    let tail = this.decoder.finish();
                    this.frame(tail);
                }
            }
        }
    }
}

/// Split a leading `{...}\n` attachment preamble off the first chunk.
pub fn split_preamble(chunk: &str) -> Option<(Vec<RawAttachment>, &str)> {
    if !chunk.trim().starts_with('{') {
        return None;
    }
    let Some(newline) = chunk.find('\n') else {
        log::debug!("First chunk looks like JSON but has no newline; treating as text");
        return None;
    };
    match serde_json::from_str::<StreamPreamble>(&chunk[..newline]) {
        Ok(preamble) => Some((preamble.attachments, &chunk[newline + 1..])),
        Err(e) => {
            log::warn!("Unreadable stream preamble, treating as text: {}", e);
            None
        }
    }
}

/// Incremental UTF-8 decoding across chunk boundaries.
#[derive(Default)]
struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(s) => {
                    out.push_str(s);
                    self.carry.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.carry[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            self.carry.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        tail
    }
}
