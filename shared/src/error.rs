//! Error types for the Marchiver background host.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving extension requests.
#[derive(Error, Debug)]
pub enum Error {
    /// Messaging channel to the extension is broken or a frame is malformed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Archive service answered with a non-2xx status
    #[error("API returned status {status}")]
    ApiStatus { status: u16 },

    /// Archive service unreachable, or its body could not be decoded
    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    /// Required request field missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Action tag not in the dispatch table
    #[error("Unhandled message action: {0}")]
    UnroutedAction(String),

    /// Settings storage I/O error
    #[error("Settings storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status reported by the archive service, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiStatus { status } => Some(*status),
            Error::Api(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::ApiStatus { .. } | Error::Api(_) => "api",
            Error::Validation(_) => "validation",
            Error::UnroutedAction(_) => "unrouted_action",
            Error::Storage(_) | Error::Serialization(_) => "settings",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}
