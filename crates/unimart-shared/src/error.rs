use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The small set of failure kinds surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    PermissionDenied,
    Network,
    Validation,
    NotFound,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::PermissionDenied => "permission denied",
            ErrorCategory::Network => "network failure",
            ErrorCategory::Validation => "validation failure",
            ErrorCategory::NotFound => "not found",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Implemented by every error type that can reach the user.
pub trait Categorize {
    fn category(&self) -> ErrorCategory;
}

/// A rejected form field. The message is shown verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Product name is required")]
    NameRequired,

    #[error("Price is required")]
    PriceRequired,

    #[error("Please enter a valid price")]
    InvalidPrice,

    #[error("Contact number is required")]
    ContactRequired,

    #[error("Please enter a valid contact number")]
    InvalidContact,

    #[error("At least one image is required")]
    ImageRequired,

    #[error("Maximum 3 images allowed")]
    TooManyImages,

    #[error("Please enter your name")]
    ProfileNameRequired,

    #[error("Please enter a valid 10-digit mobile number")]
    InvalidMobile,

    #[error("All fields are required")]
    SignupFieldsRequired,

    #[error("Email and password are required")]
    CredentialsRequired,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message is too long")]
    MessageTooLong,

    #[error("You cannot start a chat about your own listing")]
    SelfConversation,
}

impl Categorize for ValidationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}
