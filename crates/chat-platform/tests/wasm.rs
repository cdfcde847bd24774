//! WASM-target tests for chat-platform (Node.js runtime).
//!
//! Covers URL building, credential handling and object-URL previews under
//! wasm32-unknown-unknown via `wasm-pack test --node`. Real fetches need a
//! backend and are not exercised here.

use wasm_bindgen_test::*;

use chat_core::ports::{paths, HttpMethod, PreviewPort, TransportPort};
use chat_platform::{HttpTransport, ObjectUrlPreviews};
use chat_types::attachment::PendingFile;
use chat_types::config::ClientConfig;

fn transport() -> HttpTransport {
    HttpTransport::new(&ClientConfig {
        api_base: "http://api.test/".to_string(),
        ..ClientConfig::default()
    })
}

// ─── HttpTransport Tests ─────────────────────────────────

#[wasm_bindgen_test]
fn transport_backend_name() {
    assert_eq!(transport().backend_name(), "fetch");
}

#[wasm_bindgen_test]
fn transport_credential_toggles() {
    let t = transport();
    assert!(!t.has_credential());
    t.set_credential(Some("token".to_string()));
    assert!(t.has_credential());
    t.set_credential(Some(String::new()));
    assert!(!t.has_credential());
}

#[wasm_bindgen_test]
fn transport_endpoint_trims_base() {
    let t = transport();
    assert_eq!(
        t.endpoint(HttpMethod::Post, paths::CHAT),
        "http://api.test/chat"
    );
}

#[wasm_bindgen_test]
fn transport_appends_user_id_to_gets_only() {
    let t = transport();
    t.set_user_id(Some("a b".to_string()));
    assert_eq!(
        t.endpoint(HttpMethod::Get, paths::SESSIONS),
        "http://api.test/chat-sessions?user_id=a%20b"
    );
    assert_eq!(
        t.endpoint(HttpMethod::Get, &paths::recent_files("4", 5)),
        "http://api.test/file-context/recent/4?limit=5&user_id=a%20b"
    );
    assert_eq!(
        t.endpoint(HttpMethod::Delete, &paths::session("4")),
        "http://api.test/chat-sessions/4"
    );
}

// ─── ObjectUrlPreviews Tests ─────────────────────────────

#[wasm_bindgen_test]
fn previews_create_and_revoke() {
    let previews = ObjectUrlPreviews::new();
    let file = PendingFile::new("dot.png", "image/png", vec![137u8, 80, 78, 71]);
    let handle = previews.create_handle(&file).unwrap();
    assert!(handle.starts_with("blob:"));
    previews.revoke_handle(&handle);
    // Unknown handles are tolerated.
    previews.revoke_handle("blob:nothing");
}
