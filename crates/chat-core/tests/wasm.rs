//! WASM-target tests for chat-core.
//!
//! Runs the event bus, stream ingestion, attachment merge and history
//! pairing under wasm32-unknown-unknown via `wasm-pack test --node`.

use wasm_bindgen_test::*;

use chat_core::CancellationToken;
use chat_core::event_bus::EventBus;
use chat_core::history::history_to_messages;
use chat_core::ingest::*;
use chat_core::ports::ByteStream;
use chat_core::reconcile::merge_attachments;
use chat_types::attachment::{Attachment, RawAttachment};
use chat_types::event::StoreEvent;
use chat_types::message::NO_RESPONSE;
use chat_types::wire::HistoryRow;

use futures::executor::block_on;
use futures::{stream, StreamExt};
use serde_json::json;

fn body(parts: &[&str]) -> ByteStream {
    let items: Vec<chat_types::Result<Vec<u8>>> =
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
    Box::pin(stream::iter(items))
}

// ─── EventBus Tests ──────────────────────────────────────

#[wasm_bindgen_test]
fn event_bus_emit_and_drain() {
    let bus = EventBus::new();
    bus.emit(StoreEvent::SessionsChanged);
    bus.emit(StoreEvent::MessageUpdated { id: "a".to_string() });
    bus.emit(StoreEvent::MessageUpdated { id: "a".to_string() });
    assert_eq!(bus.drain_coalesced().len(), 2);
    assert!(!bus.has_pending());
}

// ─── Ingestion Tests ─────────────────────────────────────

#[wasm_bindgen_test]
fn ingest_preamble_then_text() {
    let events: Vec<_> = block_on(
        StreamingIngester::new(body(&["{\"attachments\":[]}\nHello", " world"]), CancellationToken::new())
            .collect(),
    );
    assert_eq!(
        events,
        vec![
            Ok(IngestEvent::AttachmentPreamble(vec![])),
            Ok(IngestEvent::TextChunk("Hello".to_string())),
            Ok(IngestEvent::TextChunk(" world".to_string())),
        ]
    );
}

#[wasm_bindgen_test]
fn ingest_cancelled_token_stops_immediately() {
    let token = CancellationToken::new();
    token.cancel();
    let events: Vec<_> = block_on(StreamingIngester::new(body(&["x"]), token).collect());
    assert_eq!(events, vec![Err(chat_types::ChatError::Cancelled)]);
}

// ─── Merge & History Tests ───────────────────────────────

#[wasm_bindgen_test]
fn merge_keeps_local_name() {
    let server: RawAttachment = serde_json::from_value(json!({ "url": "http://x", "name": "" })).unwrap();
    let merged = merge_attachments(&[Attachment::named("a.png")], &[server]);
    assert_eq!(merged[0].name, "a.png");
    assert_eq!(merged[0].url(), Some("http://x"));
}

#[wasm_bindgen_test]
fn history_pairs_and_falls_back() {
    let rows: Vec<HistoryRow> = serde_json::from_value(json!([
        { "id": 1, "message": "hi", "response": "hello" },
        { "id": 2, "message": "still there?" }
    ]))
    .unwrap();
    let messages = history_to_messages(&rows);
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].id, "1-response");
    assert_eq!(messages[3].text, NO_RESPONSE);
}
