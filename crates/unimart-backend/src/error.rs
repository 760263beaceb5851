use thiserror::Error;
use unimart_shared::{Categorize, ErrorCategory};

/// Authentication failures reported by the identity service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("That email address is already in use!")]
    EmailInUse,

    #[error("That email address is invalid!")]
    InvalidEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("Your session has expired, please sign in again")]
    SessionExpired,

    #[error("This account has been disabled")]
    UserDisabled,

    #[error("Authentication failed: {0}")]
    Other(String),
}

impl AuthError {
    /// Map an identity service error code (`EMAIL_EXISTS`,
    /// `WEAK_PASSWORD : ...`) onto a variant.
    pub fn from_code(code: &str) -> Self {
        let head = code.split(':').next().unwrap_or(code).trim();
        match head {
            "EMAIL_EXISTS" => AuthError::EmailInUse,
            "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "MISSING_PASSWORD" => {
                AuthError::InvalidCredentials
            }
            "WEAK_PASSWORD" => AuthError::WeakPassword,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND" => {
                AuthError::SessionExpired
            }
            "USER_DISABLED" => AuthError::UserDisabled,
            other => AuthError::Other(other.to_string()),
        }
    }
}

/// Errors produced by any backend implementation.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("You must be signed in")]
    Unauthenticated,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unexpected backend response: {0}")]
    Protocol(String),

    #[error("Document decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend is not configured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            BackendError::Network(e.to_string())
        } else {
            BackendError::Protocol(e.to_string())
        }
    }
}

impl Categorize for BackendError {
    fn category(&self) -> ErrorCategory {
        match self {
            BackendError::PermissionDenied(_) | BackendError::Unauthenticated => {
                ErrorCategory::PermissionDenied
            }
            BackendError::Network(_) => ErrorCategory::Network,
            BackendError::NotFound(_) => ErrorCategory::NotFound,
            BackendError::Auth(AuthError::SessionExpired | AuthError::UserDisabled) => {
                ErrorCategory::PermissionDenied
            }
            BackendError::Auth(AuthError::Other(_)) => ErrorCategory::Unknown,
            BackendError::Auth(_) => ErrorCategory::Validation,
            BackendError::Storage(_)
            | BackendError::Protocol(_)
            | BackendError::Decode(_)
            | BackendError::Config(_) => ErrorCategory::Unknown,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
