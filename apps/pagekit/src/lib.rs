//! pagekit: the shared client-side utility layer for the course, résumé,
//! file-analysis and URL-shortener front ends.
//!
//! Components render into a headless [`dom::Page`] and talk to backends via
//! [`request::RequestClient`]. A [`state::PageContext`] bundles them for page
//! initializers.

pub mod clipboard;
pub mod config;
pub mod debounce;
pub mod dom;
pub mod dragdrop;
pub mod errors;
pub mod form_guard;
pub mod format;
pub mod notifier;
pub mod preferences;
pub mod progress;
pub mod request;
pub mod state;

pub use errors::KitError;
pub use notifier::{Notifier, Severity};
pub use state::PageContext;
