use thiserror::Error;

/// Shown when a request never produced a usable answer from the server.
pub const GENERIC_NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";

/// Used when the server reports failure without an `error` field.
pub const GENERIC_REQUEST_MESSAGE: &str = "Request failed";

/// Library-level error type.
/// Every fallible operation in pagekit returns `Result<T, KitError>`.
#[derive(Debug, Error)]
pub enum KitError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    /// Displays as the server-supplied message only.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Invalid JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

impl KitError {
    /// Text suitable for a user-facing notification.
    ///
    /// Transport and parse failures collapse to a generic message; application
    /// failures keep whatever the server said.
    pub fn user_message(&self) -> String {
        match self {
            KitError::Network(_) | KitError::Parse(_) => GENERIC_NETWORK_MESSAGE.to_string(),
            KitError::Api { message, .. } => message.clone(),
            KitError::Storage(e) => format!("Could not save your settings: {e}"),
            KitError::Clipboard(_) => "Failed to copy to clipboard".to_string(),
        }
    }

    /// HTTP status for application failures, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            KitError::Api { status, .. } => Some(*status),
            KitError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
