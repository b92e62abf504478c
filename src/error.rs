//! Error types for board operations.

use thiserror::Error;

/// Result type alias for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Main error type for board operations.
#[derive(Error, Debug)]
pub enum BoardError {
    /// The remote document or object service rejected or failed a call
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Input rejected before any remote call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// A topic with this exact name already exists
    #[error("Topic already exists: {0}")]
    DuplicateTopic(String),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local storage errors (object files, identity file)
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// CAPTCHA widget errors (unknown handle, render failure)
    #[error("CAPTCHA error: {0}")]
    Captcha(String),
}

impl BoardError {
    /// Creates a new remote service error.
    pub fn remote<T: ToString>(msg: T) -> Self {
        Self::Remote(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new not found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Creates a new CAPTCHA error.
    pub fn captcha<T: ToString>(msg: T) -> Self {
        Self::Captcha(msg.to_string())
    }

    /// Returns true for failures caused by the user's input rather than the
    /// remote service. These are shown as a synchronous alert; everything else
    /// is logged and shown as a generic failure message.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateTopic(_))
    }

    /// Alert for a failed user action: the error's own message when the user
    /// can fix it, `fallback` (e.g. "Failed to add post.") otherwise.
    pub fn alert_or(&self, fallback: &str) -> String {
        match self {
            Self::Remote(_) | Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => {
                fallback.to_string()
            }
            _ => self.alert_text(),
        }
    }

    /// Message suitable for showing to the user in an alert.
    pub fn alert_text(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::DuplicateTopic(_) => "This topic already exists!".to_string(),
            Self::NotFound(_) => "That item no longer exists.".to_string(),
            _ => "The request failed. Please try again.".to_string(),
        }
    }
}
