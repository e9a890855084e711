//! Small user settings persisted to page storage.
//!
//! The full preference set lives under `PREFERENCES_KEY`; the active theme is
//! also kept on its own under `THEME_KEY`. A theme in the saved set wins over
//! the standalone key. Reads never fail: missing or malformed data yields
//! defaults.

pub mod storage;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dom::Page;
use crate::errors::KitError;

pub use storage::{FileStorage, MemoryStorage, Storage};

pub const PREFERENCES_KEY: &str = "settings";
pub const THEME_KEY: &str = "theme";
pub const THEME_ATTRIBUTE: &str = "data-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

/// Theme plus free-form options such as language or quality level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

impl Preferences {
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Overwrites the stored preference set.
    pub fn save(&self, preferences: &Preferences) -> Result<(), KitError> {
        let raw = serde_json::to_string(preferences)?;
        self.storage.set_item(PREFERENCES_KEY, &raw)?;
        debug!(keys = preferences.options.len(), "Preferences saved");
        Ok(())
    }

    /// Stored preferences, or defaults when absent or not a JSON object.
    ///
    /// An unrecognized theme is dropped on its own; the other keys survive.
    pub fn load(&self) -> Preferences {
        let Some(raw) = self.storage.get_item(PREFERENCES_KEY) else {
            return Preferences::default();
        };
        let mut options: BTreeMap<String, Value> = match serde_json::from_str(&raw) {
            Ok(options) => options,
            Err(e) => {
                warn!("Stored preferences are malformed, using defaults: {e}");
                return Preferences::default();
            }
        };
        let theme = options.remove("theme").and_then(|value| {
            let parsed: Option<Theme> = value.as_str().and_then(|raw| raw.parse().ok());
            if parsed.is_none() {
                warn!(%value, "Ignoring unknown stored theme");
            }
            parsed
        });
        Preferences { theme, options }
    }

    /// Sets the page theme attribute and persists the theme on its own key.
    pub fn apply_theme(&self, page: &Page, theme: Theme) -> Result<(), KitError> {
        page.set_attribute(page.root(), THEME_ATTRIBUTE, theme.as_str());
        self.storage.set_item(THEME_KEY, theme.as_str())?;
        debug!(%theme, "Theme applied");
        Ok(())
    }

    /// Stored theme, defaulting to light.
    pub fn stored_theme(&self) -> Theme {
        self.storage
            .get_item(THEME_KEY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// Re-applies the saved theme to a freshly loaded page, falling back to
    /// the standalone theme key.
    pub fn restore_theme(&self, page: &Page) -> Theme {
        let theme = self.load().theme.unwrap_or_else(|| self.stored_theme());
        page.set_attribute(page.root(), THEME_ATTRIBUTE, theme.as_str());
        theme
    }

    /// Restores the theme and copies each saved text option into the
    /// control whose id matches its key.
    pub fn restore(&self, page: &Page) -> Preferences {
        let theme = self.restore_theme(page);
        let mut preferences = self.load();
        preferences.theme = Some(theme);
        for (key, value) in &preferences.options {
            if let (Some(node), Some(text)) = (page.get_element_by_id(key), value.as_str()) {
                page.set_value(node, text);
            }
        }
        debug!(%theme, "Preferences restored");
        preferences
    }

    pub fn toggle_theme(&self, page: &Page) -> Result<Theme, KitError> {
        let current = page
            .attribute(page.root(), THEME_ATTRIBUTE)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| self.stored_theme());
        let next = current.toggled();
        self.apply_theme(page, next)?;
        Ok(next)
    }
}
