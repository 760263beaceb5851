//! In-process backend.
//!
//! Holds accounts, documents and objects in memory, shared between every
//! handle created through [`MemoryBackend::new_device`]. Each handle has its
//! own signed-in user, so one process can play a buyer and a seller at the
//! same time. Writes publish the collection name on the change feed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;
use unimart_shared::UserId;
use uuid::Uuid;

use crate::document::{increment_path, set_path, Document, FieldUpdate, NewDocument, SetMode};
use crate::error::{AuthError, BackendError, Result};
use crate::query::Query;
use crate::traits::{AuthProvider, AuthSession, AuthUser, Backend, DocumentStore, ObjectStorage};

const MIN_PASSWORD_LEN: usize = 6;

/// Which operations an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailScope {
    Reads,
    Writes,
    Uploads,
    All,
}

/// The error an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailKind {
    PermissionDenied,
    Network,
}

impl FailKind {
    fn to_error(self) -> BackendError {
        match self {
            FailKind::PermissionDenied => BackendError::PermissionDenied("injected failure".into()),
            FailKind::Network => BackendError::Network("injected failure".into()),
        }
    }
}

#[derive(Debug)]
struct InjectedFailure {
    scope: FailScope,
    kind: FailKind,
    successes_left: usize,
}

#[derive(Debug, Clone)]
struct Account {
    uid: UserId,
    email: String,
    password: String,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

type Collection = BTreeMap<String, Map<String, Value>>;

struct Shared {
    documents: RwLock<HashMap<String, Collection>>,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    accounts: RwLock<HashMap<String, Account>>,
    refresh_tokens: RwLock<HashMap<String, String>>,
    failures: Mutex<Vec<InjectedFailure>>,
    changes: broadcast::Sender<String>,
}

pub struct MemoryBackend {
    shared: Arc<Shared>,
    current: RwLock<Option<AuthUser>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                documents: RwLock::new(HashMap::new()),
                objects: RwLock::new(BTreeMap::new()),
                accounts: RwLock::new(HashMap::new()),
                refresh_tokens: RwLock::new(HashMap::new()),
                failures: Mutex::new(Vec::new()),
                changes,
            }),
            current: RwLock::new(None),
        }
    }

    /// Another handle onto the same data with its own signed-in user.
    pub fn new_device(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            current: RwLock::new(None),
        }
    }

    /// Make operations in `scope` fail with `kind` after `successes`
    /// more successful calls.
    pub fn inject_failure(&self, scope: FailScope, kind: FailKind, successes: usize) {
        self.shared
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(InjectedFailure {
                scope,
                kind,
                successes_left: successes,
            });
    }

    pub fn clear_failures(&self) {
        self.shared
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.shared
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn object_paths(&self) -> Vec<String> {
        self.shared
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.shared
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn check(&self, op: FailScope) -> Result<()> {
        let mut failures = self
            .shared
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for failure in failures.iter_mut() {
            if failure.scope != op && failure.scope != FailScope::All {
                continue;
            }
            if failure.successes_left > 0 {
                failure.successes_left -= 1;
                continue;
            }
            return Err(failure.kind.to_error());
        }
        Ok(())
    }

    fn require_user(&self) -> Result<AuthUser> {
        self.current_user().ok_or(BackendError::Unauthenticated)
    }

    fn start_session(&self, account: &Account) -> AuthSession {
        let user = AuthUser {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
        };
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.shared
            .refresh_tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(refresh_token.clone(), account.email.clone());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        AuthSession { user, refresh_token }
    }

    fn notify(&self, collection: &str) {
        // No receivers is fine.
        let _ = self.shared.changes.send(collection.to_string());
    }

    fn with_collection<R>(&self, collection: &str, f: impl FnOnce(&mut Collection) -> R) -> R {
        let mut docs = self
            .shared
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(docs.entry(collection.to_string()).or_default())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

fn materialize(doc: NewDocument) -> Map<String, Value> {
    let mut data = doc.data;
    for path in &doc.server_timestamps {
        set_path(&mut data, path, now_value());
    }
    data
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(AuthError::InvalidEmail.into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword.into());
        }

        let account = {
            let mut accounts = self
                .shared
                .accounts
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse.into());
            }
            let uid = Uuid::new_v4().simple().to_string()[..28].to_string();
            let account = Account {
                uid: UserId(uid),
                email: email.clone(),
                password: password.to_string(),
            };
            accounts.insert(email, account.clone());
            account
        };

        debug!(uid = %account.uid, "memory account created");
        Ok(self.start_session(&account))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim().to_lowercase();
        let account = self
            .shared
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email)
            .filter(|a| a.password == password)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        Ok(self.start_session(&account))
    }

    async fn restore(&self, refresh_token: &str) -> Result<AuthSession> {
        let email = self
            .shared
            .refresh_tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(refresh_token)
            .cloned()
            .ok_or(AuthError::SessionExpired)?;
        let account = self
            .shared
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email)
            .cloned()
            .ok_or(AuthError::SessionExpired)?;
        let user = AuthUser {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        Ok(AuthSession {
            user,
            refresh_token: refresh_token.to_string(),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String> {
        self.require_user()?;
        self.check(FailScope::Writes)?;

        let id = Uuid::new_v4().simple().to_string()[..20].to_string();
        let data = materialize(doc);
        self.with_collection(collection, |docs| docs.insert(id.clone(), data));
        self.notify(collection);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, doc: NewDocument, mode: SetMode) -> Result<()> {
        self.require_user()?;
        self.check(FailScope::Writes)?;

        let data = materialize(doc);
        self.with_collection(collection, |docs| match (mode, docs.get_mut(id)) {
            (SetMode::Merge, Some(existing)) => existing.extend(data),
            _ => {
                docs.insert(id.to_string(), data);
            }
        });
        self.notify(collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check(FailScope::Reads)?;
        let docs = self
            .shared
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn update(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<()> {
        self.require_user()?;
        self.check(FailScope::Writes)?;

        let applied = self.with_collection(collection, |docs| {
            let Some(data) = docs.get_mut(id) else {
                return false;
            };
            for update in updates {
                match update {
                    FieldUpdate::Set(path, value) => set_path(data, &path, value),
                    FieldUpdate::Increment(path, by) => increment_path(data, &path, by),
                    FieldUpdate::ServerTimestamp(path) => set_path(data, &path, now_value()),
                }
            }
            true
        });

        if !applied {
            return Err(BackendError::NotFound(format!("{collection}/{id}")));
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.require_user()?;
        self.check(FailScope::Writes)?;

        let removed = self.with_collection(collection, |docs| docs.remove(id).is_some());
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.check(FailScope::Reads)?;
        let snapshot: Vec<Document> = {
            let docs = self
                .shared
                .documents
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            docs.get(&query.collection)
                .map(|c| {
                    c.iter()
                        .map(|(id, data)| Document::new(id.clone(), data.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(query.apply(snapshot))
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        // Let sibling uploads interleave the way real requests do.
        tokio::task::yield_now().await;

        self.require_user()?;
        self.check(FailScope::Uploads)?;

        if bytes.is_empty() {
            return Err(BackendError::Storage("empty upload".into()));
        }

        self.shared
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                path.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        debug!(path, "memory object stored");
        Ok(format!("memory://{path}"))
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        self.require_user()?;
        self.check(FailScope::Uploads)?;
        let removed = self
            .shared
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        match removed {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(path.to_string())),
        }
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn change_feed(&self) -> Option<broadcast::Receiver<String>> {
        Some(self.shared.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn signed_in() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.sign_up("seller@uni.edu", "hunter22").await.unwrap();
        backend
    }

    fn body(v: Value) -> NewDocument {
        NewDocument::new(v.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn sign_up_rules() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.sign_up("nope", "hunter22").await,
            Err(BackendError::Auth(AuthError::InvalidEmail))
        ));
        assert!(matches!(
            backend.sign_up("a@uni.edu", "123").await,
            Err(BackendError::Auth(AuthError::WeakPassword))
        ));
        backend.sign_up("a@uni.edu", "hunter22").await.unwrap();
        assert!(matches!(
            backend.sign_up("A@uni.edu", "hunter22").await,
            Err(BackendError::Auth(AuthError::EmailInUse))
        ));
    }

    #[tokio::test]
    async fn restore_from_refresh_token() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("a@uni.edu", "hunter22").await.unwrap();
        backend.sign_out().await.unwrap();
        assert!(backend.current_user().is_none());

        let device = backend.new_device();
        let restored = device.restore(&session.refresh_token).await.unwrap();
        assert_eq!(restored.user.uid, session.user.uid);
        assert!(device.restore("bogus").await.is_err());
    }

    #[tokio::test]
    async fn writes_require_sign_in() {
        let backend = MemoryBackend::new();
        let err = backend.create("products", body(json!({ "name": "x" }))).await;
        assert!(matches!(err, Err(BackendError::Unauthenticated)));
    }

    #[tokio::test]
    async fn create_stamps_server_time() {
        let backend = signed_in().await;
        let id = backend
            .create(
                "products",
                body(json!({ "name": "Lamp" })).server_timestamp("createdAt"),
            )
            .await
            .unwrap();
        let doc = backend.get("products", &id).await.unwrap().unwrap();
        assert!(doc.field("createdAt").and_then(Value::as_str).is_some());
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let backend = signed_in().await;
        let err = backend
            .update("conversations", "nope", vec![FieldUpdate::set("lastMessage", "hi")])
            .await;
        assert!(matches!(err, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn merge_keeps_untouched_fields() {
        let backend = signed_in().await;
        backend
            .set("users", "u1", body(json!({ "name": "A", "mobile": "1" })), SetMode::Overwrite)
            .await
            .unwrap();
        backend
            .set("users", "u1", body(json!({ "name": "B" })), SetMode::Merge)
            .await
            .unwrap();
        let doc = backend.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({ "name": "B", "mobile": "1" }).as_object().cloned().unwrap());
    }

    #[tokio::test]
    async fn injected_failures_after_successes() {
        let backend = signed_in().await;
        backend.inject_failure(FailScope::Uploads, FailKind::Network, 1);

        backend.upload("a.jpg", vec![1], "image/jpeg").await.unwrap();
        let err = backend.upload("b.jpg", vec![2], "image/jpeg").await;
        assert!(matches!(err, Err(BackendError::Network(_))));

        backend.clear_failures();
        backend.upload("c.jpg", vec![3], "image/jpeg").await.unwrap();
        assert_eq!(backend.object_paths(), vec!["a.jpg", "c.jpg"]);
    }

    #[tokio::test]
    async fn writes_publish_change_hints() {
        let backend = signed_in().await;
        let mut feed = backend.change_feed().unwrap();
        backend.create("messages", body(json!({ "text": "hi" }))).await.unwrap();
        assert_eq!(feed.recv().await.unwrap(), "messages");
    }

    #[tokio::test]
    async fn devices_share_data_not_sessions() {
        let seller = signed_in().await;
        let buyer = seller.new_device();
        assert!(buyer.current_user().is_none());

        seller.create("products", body(json!({ "name": "Lamp" }))).await.unwrap();
        assert_eq!(buyer.document_count("products"), 1);
    }

    #[tokio::test]
    async fn objects_store_and_delete() {
        let backend = signed_in().await;
        let url = backend.upload("profiles/u1_1.jpg", vec![1, 2], "image/jpeg").await.unwrap();
        assert_eq!(url, "memory://profiles/u1_1.jpg");
        assert_eq!(backend.object("profiles/u1_1.jpg").unwrap().content_type, "image/jpeg");

        let empty = backend.upload("profiles/empty.jpg", Vec::new(), "image/jpeg").await;
        assert!(matches!(empty, Err(BackendError::Storage(_))));

        backend.delete_object("profiles/u1_1.jpg").await.unwrap();
        assert!(backend.object_paths().is_empty());
        assert!(matches!(
            backend.delete_object("profiles/u1_1.jpg").await,
            Err(BackendError::NotFound(_))
        ));
    }
}
