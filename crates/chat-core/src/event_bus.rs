//! Change-notification queue between the session store and the UI.
//!
//! Single-threaded (WASM constraint), shared through `Rc<RefCell<_>>`.
//! The store pushes; the presentation layer drains once per frame or tick
//! and re-reads whatever state the events point at.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use chat_types::event::StoreEvent;

/// Shared event queue, clone-cheap via Rc.
#[derive(Clone, Default)]
pub struct EventBus {
    queue: Rc<RefCell<VecDeque<StoreEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: StoreEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    pub fn drain(&self) -> Vec<StoreEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Drain, collapsing runs of `MessageUpdated` for the same id.
    ///
    /// A streamed reply emits one update per chunk; a renderer that only
    /// looks at the latest text needs one.
    pub fn drain_coalesced(&self) -> Vec<StoreEvent> {
        let mut out: Vec<StoreEvent> = Vec::new();
        for event in self.queue.borrow_mut().drain(..) {
            if let (StoreEvent::MessageUpdated { id }, Some(StoreEvent::MessageUpdated { id: last })) =
                (&event, out.last())
            {
                if id == last {
                    continue;
                }
            }
            out.push(event);
        }
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}
