//! Application state shared by every command.
//!
//! [`AppState`] is cheap to share behind an `Arc`: the backend is already
//! reference counted and the local database sits behind a mutex.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use unimart_backend::{AuthUser, Backend, LiveQuery, Query, Shape};
use unimart_shared::types::Record;
use unimart_store::{Database, StoreError};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::Notifier;

pub struct AppState {
    /// The hosted backend (or its in-memory stand-in).
    backend: Arc<dyn Backend>,

    /// Device-local database: favorites, persisted session, settings.
    database: Mutex<Database>,

    /// Transient notices for the front end.
    notifier: Notifier,

    /// Signed-in user, updated on every sign in / out.
    auth_tx: watch::Sender<Option<AuthUser>>,

    /// How often live queries poll when the backend pushes no hints.
    poll_interval: Duration,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, database: Database, poll_interval: Duration) -> Self {
        let (auth_tx, _) = watch::channel(backend.current_user());
        Self {
            backend,
            database: Mutex::new(database),
            notifier: Notifier::new(),
            auth_tx,
            poll_interval,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let backend = config.build_backend()?;
        let database = config.open_database()?;
        info!(backend = backend.name(), "client state ready");
        Ok(Self::new(backend, database, config.poll_interval))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Run `f` against the local database.
    pub fn with_db<R>(&self, f: impl FnOnce(&Database) -> std::result::Result<R, StoreError>) -> Result<R> {
        let guard = self.database.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&guard)?)
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.backend.current_user()
    }

    /// The signed-in user, or `NotSignedIn` naming what the user tried to do.
    pub fn require_user(&self, action: &'static str) -> Result<AuthUser> {
        self.current_user().ok_or(ClientError::NotSignedIn(action))
    }

    /// Watch sign in and sign out.
    pub fn auth_changes(&self) -> watch::Receiver<Option<AuthUser>> {
        self.auth_tx.subscribe()
    }

    pub(crate) fn publish_auth(&self) {
        let user = self.current_user();
        self.auth_tx.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }

    pub(crate) fn live<T>(&self, query: Query, shape: Option<Shape<T>>) -> LiveQuery<T>
    where
        T: Record + Clone + PartialEq,
    {
        LiveQuery::spawn(Arc::clone(&self.backend), query, shape, self.poll_interval)
    }
}
