//! Lifecycle of local attachment previews.
//!
//! Preview handles (object URLs) are a page-level resource: anything not
//! revoked stays allocated until the tab closes. The manager remembers which
//! handles it handed out and revokes each at most once, so releasing the
//! same list twice, or a list whose entries already point at the server,
//! is harmless.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use chat_types::attachment::{Attachment, PendingFile};

use crate::ports::PreviewPort;

#[derive(Clone)]
pub struct AttachmentLifecycle {
    port: Rc<dyn PreviewPort>,
    live: Rc<RefCell<HashSet<String>>>,
}

impl AttachmentLifecycle {
    pub fn new(port: Rc<dyn PreviewPort>) -> Self {
        Self {
            port,
            live: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Allocate a preview for image files. Other types get none.
    pub fn create_preview(&self, file: &PendingFile) -> Option<String> {
        if !file.is_image() {
            return None;
        }
        match self.port.create_handle(file) {
            Ok(handle) => {
                self.live.borrow_mut().insert(handle.clone());
                Some(handle)
            }
            Err(e) => {
                log::warn!("No preview for {}: {}", file.name, e);
                None
            }
        }
    }

    /// Optimistic attachment list for a send.
    pub fn stage(&self, files: &[PendingFile]) -> Vec<Attachment> {
        files
            .iter()
            .map(|file| Attachment::from_pending(file, self.create_preview(file)))
            .collect()
    }

    /// Revoke every live preview handle referenced by `attachments`.
    /// Returns how many were actually revoked.
    pub fn release_all(&self, attachments: &[Attachment]) -> usize {
        let mut released = 0;
        for handle in attachments.iter().filter_map(Attachment::preview_handle) {
            let was_live = self.live.borrow_mut().remove(handle);
            if was_live {
                self.port.revoke_handle(handle);
                released += 1;
            }
        }
        if released > 0 {
            log::debug!("Released {} preview handle(s)", released);
        }
        released
    }

    /// Handles allocated and not yet revoked.
    pub fn live_handles(&self) -> usize {
        self.live.borrow().len()
    }
}
