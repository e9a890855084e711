use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::dom::{DomEvent, EventKind, EventOutcome, NodeId, Page};

/// Quiet window used for search-as-you-type inputs.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Delays `f` until calls have stopped for `delay`.
/// Each call cancels the pending one, so only the last arguments are used.
///
/// Must be called from within a Tokio runtime.
pub struct Debouncer<A> {
    delay: Duration,
    f: Arc<dyn Fn(A) + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new(delay: Duration, f: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            f: Arc::new(f),
            pending: Mutex::new(None),
        }
    }

    pub fn call(&self, args: A) {
        let f = Arc::clone(&self.f);
        let delay = self.delay;
        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            previous.abort();
            debug!("Debounced call restarted");
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f(args);
        }));
    }
}

impl<A> Debouncer<A> {
    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the pending call, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending().take() {
            previous.abort();
        }
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Wires `input` so each keystroke feeds its trimmed value to `debouncer`.
/// Re-running on the same input replaces the earlier binding.
pub fn setup_search(page: &Page, input: NodeId, debouncer: Arc<Debouncer<String>>) -> bool {
    page.add_listener(
        input,
        "search",
        EventKind::Input,
        Arc::new(move |page: &Page, _: &DomEvent| {
            let query = page.value(input).unwrap_or_default().trim().to_string();
            debouncer.call(query);
            EventOutcome::Continue
        }),
    )
}
