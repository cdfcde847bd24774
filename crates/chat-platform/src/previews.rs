//! Object-URL preview handles for picked images.

use js_sys::{Array, Uint8Array};
use web_sys::{Blob, BlobPropertyBag, Url};

use chat_core::ports::PreviewPort;
use chat_types::{ChatError, Result, attachment::PendingFile};

/// Copy a picked file into a typed `Blob`.
pub(crate) fn file_blob(file: &PendingFile) -> Result<Blob> {
    let bytes = Uint8Array::from(&file.data[..]);
    let parts = Array::of1(&bytes);
    let options = BlobPropertyBag::new();
    options.set_type(&file.mime);
    Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| ChatError::JsInterop(format!("{:?}", e)))
}

/// Allocates `blob:` URLs with `URL.createObjectURL`.
#[derive(Debug, Default)]
pub struct ObjectUrlPreviews;

impl ObjectUrlPreviews {
    pub fn new() -> Self {
        Self
    }
}

impl PreviewPort for ObjectUrlPreviews {
    fn create_handle(&self, file: &PendingFile) -> Result<String> {
        let blob = file_blob(file)?;
        Url::create_object_url_with_blob(&blob).map_err(|e| ChatError::Preview(format!("{:?}", e)))
    }

    fn revoke_handle(&self, handle: &str) {
        if let Err(e) = Url::revoke_object_url(handle) {
            log::warn!("revokeObjectURL({}) failed: {:?}", handle, e);
        }
    }
}
