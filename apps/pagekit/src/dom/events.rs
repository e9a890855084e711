use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Click,
    Submit,
    Input,
    DragEnter,
    DragOver,
    DragLeave,
    Drop,
}

/// A file as seen by a drop or file-input event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DomEvent {
    pub kind: EventKind,
    /// Files carried by drag/drop events; empty otherwise.
    pub files: Vec<FileDescriptor>,
}

impl DomEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
        }
    }

    pub fn drop_files(files: Vec<FileDescriptor>) -> Self {
        Self {
            kind: EventKind::Drop,
            files,
        }
    }
}

/// What a listener asks the host to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Continue,
    PreventDefault,
}

/// Listeners receive the page instead of capturing it, so a page never owns
/// a closure that owns the page.
pub type Listener = Arc<dyn Fn(&Page, &DomEvent) -> EventOutcome + Send + Sync>;
