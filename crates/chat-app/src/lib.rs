//! Chat App: WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the browser adapters and the session store and hands a
//! `ChatClient` to the JS presentation layer.

mod app;

pub use app::ChatClient;

use wasm_bindgen::prelude::*;

/// Runs once when the module is instantiated
#[wasm_bindgen(start)]
pub fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Chat client WASM starting...");
}
