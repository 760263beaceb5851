use std::path::PathBuf;

use thiserror::Error;
use unimart_backend::BackendError;
use unimart_shared::{Categorize, ErrorCategory, ValidationError};
use unimart_store::StoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Image upload failed: {0}")]
    Upload(#[source] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Carries the action the user attempted, e.g. "add a product".
    #[error("You must be logged in to {0}")]
    NotSignedIn(&'static str),

    #[error("You can only change your own listings")]
    NotOwner,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Could not read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No contact number available")]
    NoContact,

    #[error("Configuration error: {0}")]
    Config(String),

    /// A live query published a failure instead of results.
    #[error("{0}")]
    Subscription(String),
}

impl Categorize for ClientError {
    fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Validation(_) | ClientError::NoContact => ErrorCategory::Validation,
            ClientError::Backend(e) | ClientError::Upload(e) => e.category(),
            ClientError::Store(e) => e.category(),
            ClientError::NotSignedIn(_) | ClientError::NotOwner => ErrorCategory::PermissionDenied,
            ClientError::NotFound(_) => ErrorCategory::NotFound,
            ClientError::ImageRead { .. } | ClientError::Config(_) | ClientError::Subscription(_) => {
                ErrorCategory::Unknown
            }
        }
    }
}

impl ClientError {
    /// Whether the message already makes sense to the user without a
    /// "Failed to ..." prefix.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_)
                | ClientError::NotSignedIn(_)
                | ClientError::NotOwner
                | ClientError::NoContact
        )
    }

    /// Message shown for a failed write, e.g.
    /// `failure_message("Failed to add product: ")`.
    pub fn failure_message(&self, prefix: &str) -> String {
        if self.is_user_input() {
            return self.to_string();
        }
        let detail = match (self, self.category()) {
            (ClientError::Upload(_), ErrorCategory::PermissionDenied) => {
                "Storage permission denied. Please check the storage rules.".to_string()
            }
            (_, ErrorCategory::PermissionDenied) => {
                "Permission denied. Check the database rules.".to_string()
            }
            (_, ErrorCategory::Network) => "Network error. Check your connection.".to_string(),
            _ => self.to_string(),
        };
        format!("{prefix}{detail}")
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_prefixed() {
        let err = ClientError::from(ValidationError::NameRequired);
        assert_eq!(err.failure_message("Failed to add product: "), "Product name is required");

        let err = ClientError::NotSignedIn("add a product");
        assert_eq!(
            err.failure_message("Failed to add product: "),
            "You must be logged in to add a product"
        );
    }

    #[test]
    fn backend_failures_are_specialised() {
        let err = ClientError::from(BackendError::PermissionDenied("rules".into()));
        assert_eq!(
            err.failure_message("Failed to add product: "),
            "Failed to add product: Permission denied. Check the database rules."
        );

        let err = ClientError::Upload(BackendError::PermissionDenied("rules".into()));
        assert!(err
            .failure_message("Failed to add product: ")
            .ends_with("Storage permission denied. Please check the storage rules."));

        let err = ClientError::from(BackendError::Network("reset".into()));
        assert_eq!(
            err.failure_message("Failed to update product: "),
            "Failed to update product: Network error. Check your connection."
        );
    }
}
