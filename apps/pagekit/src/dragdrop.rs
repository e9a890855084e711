use std::sync::Arc;

use tracing::debug;

use crate::dom::{DomEvent, EventKind, EventOutcome, NodeId, Page};

pub use crate::dom::FileDescriptor;

pub const ACTIVE_CLASS: &str = "dragover";
const LISTENER_KEY: &str = "drag-drop-zone";

pub type DropCallback = Arc<dyn Fn(Vec<FileDescriptor>) + Send + Sync>;

/// Binds drag/drop handling on `element`.
///
/// All four drag events have their default action suppressed. Enter and over
/// add `ACTIVE_CLASS`; leave and drop remove it. A drop hands the dropped
/// files to `on_drop`, once per drop, with no queueing between drops.
///
/// Attaching again to the same element replaces the previous binding.
/// Returns false if the element does not exist.
pub fn attach(page: &Page, element: NodeId, on_drop: Option<DropCallback>) -> bool {
    if !page.exists(element) {
        return false;
    }

    let listener = Arc::new(move |page: &Page, event: &DomEvent| {
        match event.kind {
            EventKind::DragEnter | EventKind::DragOver => {
                page.add_class(element, ACTIVE_CLASS);
            }
            EventKind::DragLeave => {
                page.remove_class(element, ACTIVE_CLASS);
            }
            EventKind::Drop => {
                page.remove_class(element, ACTIVE_CLASS);
                debug!(count = event.files.len(), "Files dropped");
                if let Some(callback) = &on_drop {
                    callback(event.files.clone());
                }
            }
            _ => return EventOutcome::Continue,
        }
        EventOutcome::PreventDefault
    });

    for kind in [
        EventKind::DragEnter,
        EventKind::DragOver,
        EventKind::DragLeave,
        EventKind::Drop,
    ] {
        page.add_listener(element, LISTENER_KEY, kind, listener.clone());
    }
    true
}
