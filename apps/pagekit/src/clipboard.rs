//! Clipboard helper.
//!
//! `copy` tries the system clipboard API first. If there is none, or it
//! rejects, the text goes into a temporary off-screen field which is selected
//! and copied with the page's copy command. The outcome is reported through
//! the notifier.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dom::{NodeId, Page};
use crate::errors::KitError;
use crate::notifier::Notifier;

pub const COPIED_MESSAGE: &str = "Copied to clipboard!";
pub const COPY_FAILED_MESSAGE: &str = "Failed to copy to clipboard";

/// Asynchronous system clipboard API.
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), KitError>;
}

#[derive(Clone)]
pub struct ClipboardHelper {
    page: Page,
    notifier: Notifier,
    backend: Option<Arc<dyn ClipboardBackend>>,
}

impl ClipboardHelper {
    /// `backend` is `None` when the clipboard API is unavailable.
    pub fn new(page: &Page, notifier: Notifier, backend: Option<Arc<dyn ClipboardBackend>>) -> Self {
        Self {
            page: page.clone(),
            notifier,
            backend,
        }
    }

    pub async fn copy(&self, text: &str) {
        if let Some(backend) = &self.backend {
            match backend.write_text(text).await {
                Ok(()) => {
                    self.notifier.success(COPIED_MESSAGE);
                    return;
                }
                Err(e) => warn!("Clipboard API rejected write, falling back: {e}"),
            }
        }

        if self.fallback_copy(text) {
            self.notifier.success(COPIED_MESSAGE);
        } else {
            self.notifier.danger(COPY_FAILED_MESSAGE);
        }
    }

    fn fallback_copy(&self, text: &str) -> bool {
        let field = TempField::new(&self.page, text);
        self.page.select(field.node);
        let copied = self.page.exec_copy();
        debug!(copied, "Selection-based copy attempted");
        copied
    }
}

/// Off-screen text field that exists only for the duration of one copy.
/// Removed from the page when dropped.
struct TempField {
    page: Page,
    node: NodeId,
}

impl TempField {
    fn new(page: &Page, text: &str) -> Self {
        let node = page.create_element("textarea");
        page.set_value(node, text);
        page.set_attribute(node, "readonly", "");
        page.set_attribute(node, "style", "position: fixed; left: -9999px; top: 0");
        page.append_child(page.body(), node);
        Self {
            page: page.clone(),
            node,
        }
    }
}

impl Drop for TempField {
    fn drop(&mut self) {
        self.page.remove(self.node);
    }
}
