//! Error types for sentinel-core
//!
//! This module provides the engine's error taxonomy and user-friendly
//! formatting for chat surfaces.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Unparseable reason, out-of-range point value or similar bad input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The report targets an actor that may not be disciplined (e.g. oneself)
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Conflicting state, such as a ban vote that is already open
    #[error("conflict: {0}")]
    Conflict(String),

    /// Ledger read or write failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The enforcer lacks the permission to apply an action
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A bounded wait elapsed without the required input
    #[error("timed out: {0}")]
    Timeout(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Delivery to an external collaborator failed for a reason other than permissions
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl Error {
    /// Whether this error belongs to the synchronous-rejection family
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidTarget(_))
    }

    /// Whether this error was raised because of missing platform permissions
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::StoreUnavailable(format!("corrupt identifier: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => format!("❌ Invalid input: {}", msg),
            Error::InvalidTarget(msg) => format!("❌ Invalid target: {}", msg),
            Error::Conflict(msg) => format!("⏳ {}", msg),
            Error::StoreUnavailable(_) => {
                "🗄️ The discipline ledger is unavailable. No punishment was applied.".to_string()
            }
            Error::PermissionDenied(msg) => format!("⚠️ Missing permission: {}", msg),
            Error::Timeout(msg) => format!("⌛ Timed out: {}", msg),
            Error::NotFound(msg) => format!("🔍 Not found: {}", msg),
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::Delivery(msg) => format!("📭 Delivery failed: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::InvalidTarget(_) => {
                Some("💡 You cannot discipline yourself or someone you outrank.".to_string())
            }
            Error::StoreUnavailable(_) => {
                Some("💡 Check the database path and retry the report.".to_string())
            }
            Error::PermissionDenied(_) => Some(
                "💡 Make sure the bot role sits above the target's roles and can moderate members."
                    .to_string(),
            ),
            Error::Configuration(_) => {
                Some("💡 Check the [discipline] section in config/default.toml.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in a chat message
pub fn format_error_for_chat(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}
