//! Trait abstractions over the hosted backend.
//!
//! Everything the client needs from the vendor service goes through these
//! traits, so commands can be exercised against the in-memory backend
//! without a network connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use unimart_shared::UserId;

use crate::document::{Document, FieldUpdate, NewDocument, SetMode};
use crate::error::Result;
use crate::query::Query;

/// The signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: Option<String>,
}

/// A fresh sign-in. The refresh token is what the device persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: AuthUser,
    pub refresh_token: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign in as it.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Sign back in from a persisted refresh token.
    async fn restore(&self, refresh_token: &str) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;

    fn current_user(&self) -> Option<AuthUser>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a backend-generated id and return the id.
    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String>;

    async fn set(&self, collection: &str, id: &str, doc: NewDocument, mode: SetMode) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Apply field updates to an existing document. Fails with
    /// `BackendError::NotFound` when the document does not exist.
    async fn update(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<()>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload bytes to `path` and return a download URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn delete_object(&self, path: &str) -> Result<()>;
}

/// The complete backend surface.
pub trait Backend: AuthProvider + DocumentStore + ObjectStorage {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Collection names written since subscribing, for backends that can
    /// push change hints. Live queries fall back to polling when `None`.
    fn change_feed(&self) -> Option<broadcast::Receiver<String>> {
        None
    }
}
