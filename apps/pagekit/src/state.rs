use std::sync::Arc;

use crate::clipboard::{ClipboardBackend, ClipboardHelper};
use crate::config::Config;
use crate::debounce::{setup_search, Debouncer};
use crate::dom::{NodeId, Page};
use crate::errors::KitError;
use crate::notifier::{auto_close_alerts, Notifier};
use crate::preferences::{PreferenceStore, Storage};
use crate::progress::ProgressIndicator;
use crate::request::RequestClient;

/// Everything a page initializer needs, built once per page and passed in.
#[derive(Clone)]
pub struct PageContext {
    pub page: Page,
    pub notifier: Notifier,
    pub requests: RequestClient,
    pub progress: ProgressIndicator,
    /// Only `save`/`apply_theme` mutate stored preferences.
    pub preferences: PreferenceStore,
    pub clipboard: ClipboardHelper,
    pub config: Config,
}

impl PageContext {
    pub fn init(
        config: Config,
        storage: Arc<dyn Storage>,
        clipboard: Option<Arc<dyn ClipboardBackend>>,
    ) -> Result<Self, KitError> {
        let page = Page::new();
        let notifier = Notifier::init(&page, config.notify_dismiss());
        let requests =
            RequestClient::new(config.request_timeout())?.with_base_url(config.base_url.clone());
        let preferences = PreferenceStore::new(storage);
        preferences.restore(&page);

        Ok(Self {
            progress: ProgressIndicator::new(&page),
            clipboard: ClipboardHelper::new(&page, notifier.clone(), clipboard),
            page,
            notifier,
            requests,
            preferences,
            config,
        })
    }

    /// Runs `on_query` with the trimmed contents of `input` once typing pauses
    /// for the configured debounce window.
    pub fn bind_search(
        &self,
        input: NodeId,
        on_query: impl Fn(String) + Send + Sync + 'static,
    ) -> Arc<Debouncer<String>> {
        let debouncer = Arc::new(Debouncer::new(self.config.debounce(), on_query));
        setup_search(&self.page, input, Arc::clone(&debouncer));
        debouncer
    }

    /// Closes the page's non-persistent alerts after the notification delay.
    pub fn close_alerts(&self) -> usize {
        auto_close_alerts(&self.page, self.config.notify_dismiss())
    }
}
