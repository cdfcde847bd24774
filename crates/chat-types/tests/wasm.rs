//! WASM-target tests for chat-types.
//!
//! Mirrors the native unit tests but runs under wasm32-unknown-unknown
//! via `wasm-pack test --node`.

use wasm_bindgen_test::*;

use chat_types::attachment::*;
use chat_types::config::*;
use chat_types::message::*;
use chat_types::session::*;
use chat_types::wire::*;
use serde_json::json;

// ─── Attachment Tests ────────────────────────────────────

#[wasm_bindgen_test]
fn attachment_name_fallback() {
    let atts = normalize_attachments(&json!([
        { "name": "a.png" },
        { "original_name": "b.pdf" },
        { "filename": "c.txt" },
        {}
    ]));
    let names: Vec<&str> = atts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "b.pdf", "c.txt", FALLBACK_NAME]);
}

#[wasm_bindgen_test]
fn attachment_serialized_string() {
    let atts = normalize_attachments(&json!("[{\"name\":\"x.md\"}]"));
    assert_eq!(atts.len(), 1);
    assert_eq!(atts[0].name, "x.md");
}

#[wasm_bindgen_test]
fn attachment_garbage_is_empty() {
    assert!(normalize_attachments(&json!("[{oops")).is_empty());
}

// ─── Message Tests ───────────────────────────────────────

#[wasm_bindgen_test]
fn message_ids_pair_by_suffix() {
    let cid = CorrelationId::from("abc");
    let reply = Message::assistant(cid.response_id(), "ok");
    assert!(reply.id.contains(cid.as_str()));
}

#[wasm_bindgen_test]
fn message_uuid_correlation_ids_are_unique() {
    // Exercises the `js` feature of uuid for randomness in the browser.
    let a = CorrelationId::generate();
    let b = CorrelationId::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 32);
}

// ─── Session / Wire / Config Tests ───────────────────────

#[wasm_bindgen_test]
fn session_from_server_json() {
    let session: Session =
        serde_json::from_value(json!({ "id": 1, "title": "t", "updated_at": "2024-01-01T00:00:00" }))
            .unwrap();
    assert_eq!(session.id, "1");
}

#[wasm_bindgen_test]
fn chat_reply_from_server_json() {
    let reply: ChatReply = serde_json::from_value(json!({ "reply": "hi", "chat_id": "c1" })).unwrap();
    assert_eq!(reply.reply.as_deref(), Some("hi"));
    assert_eq!(reply.chat_id.as_deref(), Some("c1"));
}

#[wasm_bindgen_test]
fn config_roundtrip() {
    let config = ClientConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
}
