//! Transient, dismissible toasts rendered into one page-wide container.
//!
//! The container is created once per page by `Notifier::init` and never
//! disposed; a second `init` on the same page reuses it. Every notification
//! gets a fresh v4 UUID and is removed from the page either when its timer
//! elapses or when its close button is clicked.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dom::{DomEvent, EventKind, EventOutcome, NodeId, Page};
use crate::errors::KitError;

pub const CONTAINER_ID: &str = "toastContainer";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_secs(5);
const NOTIFICATION_ID_ATTR: &str = "data-notification-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Danger,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    pub auto_dismiss_ms: u64,
    pub created_at: DateTime<Utc>,
}

type Registry = Arc<Mutex<HashMap<Uuid, (Notification, NodeId)>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<Uuid, (Notification, NodeId)>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct Notifier {
    page: Page,
    container: NodeId,
    auto_dismiss: Duration,
    active: Registry,
}

impl Notifier {
    /// Finds or creates the page's notification container.
    pub fn init(page: &Page, auto_dismiss: Duration) -> Self {
        let container = match page.get_element_by_id(CONTAINER_ID) {
            Some(existing) => existing,
            None => {
                let node = page.create_element("div");
                page.set_element_id(node, CONTAINER_ID);
                page.add_class(node, "toast-container");
                page.add_class(node, "position-fixed");
                page.add_class(node, "top-0");
                page.add_class(node, "end-0");
                page.add_class(node, "p-3");
                page.append_child(page.body(), node);
                debug!("Notification container created");
                node
            }
        };

        Self {
            page: page.clone(),
            container,
            auto_dismiss,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Shows `message` and schedules its removal.
    ///
    /// Auto-dismissal needs a Tokio runtime; outside one the toast stays until
    /// closed explicitly.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            auto_dismiss_ms: u64::try_from(self.auto_dismiss.as_millis()).unwrap_or(u64::MAX),
            created_at: Utc::now(),
        };
        let id = notification.id;

        let node = self.render(&notification);
        info!(%id, severity = %severity, message = %notification.message, "Notification shown");
        lock(&self.active).insert(id, (notification, node));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let notifier = self.clone();
                let delay = self.auto_dismiss;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if notifier.dismiss(id) {
                        debug!(%id, "Notification auto-dismissed");
                    }
                });
            }
            Err(_) => warn!(%id, "No async runtime; notification will not auto-dismiss"),
        }

        id
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Warning)
    }

    pub fn danger(&self, message: impl Into<String>) -> Uuid {
        self.notify(message, Severity::Danger)
    }

    /// Surfaces a failure to the user as a `danger` notification.
    pub fn report(&self, err: &KitError) -> Uuid {
        warn!(status = ?err.status(), "Reporting error to user: {err}");
        self.danger(err.user_message())
    }

    /// Last-resort handler for failures nothing else caught. The details only
    /// go to the log.
    pub fn report_unexpected(&self, err: &dyn fmt::Display) -> Uuid {
        error!("Unhandled error: {err}");
        self.danger(UNEXPECTED_ERROR_MESSAGE)
    }

    /// Removes a notification early. Returns false if it is already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        remove_entry(&self.page, &self.active, id)
    }

    /// Notifications currently on screen, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let mut list: Vec<Notification> = lock(&self.active)
            .values()
            .map(|(n, _)| n.clone())
            .collect();
        list.sort_by_key(|n| n.created_at);
        list
    }

    /// Rendered element for a live notification.
    pub fn element(&self, id: Uuid) -> Option<NodeId> {
        lock(&self.active).get(&id).map(|(_, node)| *node)
    }

    fn render(&self, notification: &Notification) -> NodeId {
        let page = &self.page;

        let toast = page.create_element("div");
        page.add_class(toast, "toast");
        page.add_class(toast, "show");
        page.add_class(toast, &format!("text-bg-{}", notification.severity));
        page.set_attribute(toast, "role", "alert");
        page.set_attribute(toast, NOTIFICATION_ID_ATTR, &notification.id.to_string());

        let body = page.create_element("div");
        page.add_class(body, "toast-body");
        page.set_text(body, &notification.message);
        page.append_child(toast, body);

        let close = page.create_element("button");
        page.add_class(close, "btn-close");
        page.set_attribute(close, "aria-label", "Close");
        page.append_child(toast, close);

        let registry = Arc::clone(&self.active);
        let id = notification.id;
        page.add_listener(
            close,
            "dismiss",
            EventKind::Click,
            Arc::new(move |page: &Page, _: &DomEvent| {
                remove_entry(page, &registry, id);
                EventOutcome::Continue
            }),
        );

        page.append_child(self.container, toast);
        toast
    }
}

/// Schedules every `.alert` already on the page to close after `delay`,
/// except those marked `alert-persistent`. Returns how many were scheduled.
///
/// Outside a Tokio runtime nothing is scheduled.
pub fn auto_close_alerts(page: &Page, delay: Duration) -> usize {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!("No async runtime; alerts will stay open");
        return 0;
    };
    let alerts: Vec<NodeId> = page
        .descendants(page.root())
        .into_iter()
        .filter(|node| {
            page.has_class(*node, "alert") && !page.has_class(*node, "alert-persistent")
        })
        .collect();

    for &alert in &alerts {
        let page = page.clone();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if page.remove(alert) {
                debug!(?alert, "Alert auto-closed");
            }
        });
    }
    alerts.len()
}

fn remove_entry(page: &Page, registry: &Registry, id: Uuid) -> bool {
    let entry = lock(registry).remove(&id);
    match entry {
        Some((_, node)) => {
            page.remove(node);
            true
        }
        None => false,
    }
}
